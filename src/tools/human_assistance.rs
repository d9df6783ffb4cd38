//! 人工协助工具
//!
//! 首次调用从不同步返回文本：总是产出 NeedsHuman，由 Turn Controller 挂起
//! 回合并记录 PendingInterrupt；resume 时人工答复被注入为本调用的结果。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::require_str_arg;
use crate::tools::{Tool, ToolError, ToolOutput};

/// 工具名常量：Turn Controller 以此识别挂起请求对应的调用
pub const HUMAN_ASSISTANCE: &str = "human_assistance";

/// human_assistance 工具
#[derive(Debug, Default)]
pub struct HumanAssistanceTool;

#[async_trait]
impl Tool for HumanAssistanceTool {
    fn name(&self) -> &str {
        HUMAN_ASSISTANCE
    }

    fn description(&self) -> &str {
        "Request assistance from a human for complex party planning decisions. Args: {\"query\": \"the question for the human\"}."
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = require_str_arg(&args, "query")?;
        Ok(ToolOutput::NeedsHuman { query })
    }
}
