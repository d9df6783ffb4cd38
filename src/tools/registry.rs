//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找，ToolExecutor 在调用时加超时与审计日志。
//! human_assistance 是唯一返回 NeedsHuman 的工具：它不产生文本结果，而是
//! 请求 Turn Controller 挂起本回合。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSpec;

/// 工具执行失败的结构化原因；Turn Controller 将其转为 observation 文本，
/// 不会因此中止回合
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend error: {0}")]
    Backend(String),

    /// 由 ToolExecutor 在超时时填入
    #[error("Tool timeout: {0}")]
    Timeout(String),
}

/// 工具执行的产出
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// 文本结果，作为 tool 消息写回对话
    Text(String),
    /// 请求人工协助：挂起回合，query 展示给人工
    NeedsHuman { query: String },
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型在 tool_calls 中引用）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认单个 query 字符串参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" }
            },
            "required": ["query"]
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// 从参数中取出字符串字段，缺失或为空时返回 MissingArgument
pub(crate) fn require_str_arg(args: &Value, key: &str) -> Result<String, ToolError> {
    let v = args
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if v.is_empty() {
        Err(ToolError::MissingArgument(key.to_string()))
    } else {
        Ok(v.to_string())
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / execute / tool_specs
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 生成暴露给模型的工具声明列表
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}
