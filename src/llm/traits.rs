//! LLM 客户端抽象
//!
//! 后端（OpenAI 兼容 / Mock）实现 LlmClient：complete 接收完整消息历史与
//! 可用工具清单，返回一条助手回合（文本 + 零或多条工具调用请求）。

use async_trait::async_trait;

use crate::store::{Message, ToolCallRequest};

/// 暴露给模型的工具声明（名称、描述、参数 JSON Schema）
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// 一次模型调用的产出：回复文本与请求顺序排列的工具调用
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    /// 纯文本回合（最终回答）
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// 携带工具调用的回合
    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }
}

/// LLM 客户端 trait：单次完成调用，失败返回错误字符串（不在此层重试）
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
