//! 宾客检索工具
//!
//! 在邀请数据索引上做语义查找，返回至多 top_k 条带相关度分数的结果文本；
//! 无命中返回固定提示，内部错误转为说明文本而非上抛。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::retrieval::InviteIndex;
use crate::tools::registry::require_str_arg;
use crate::tools::{Tool, ToolError, ToolOutput};

/// retrieval 工具：持有共享索引与返回条数上限
pub struct RetrievalTool {
    index: Arc<InviteIndex>,
    top_k: usize,
}

impl RetrievalTool {
    pub fn new(index: Arc<InviteIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        "retrieval"
    }

    fn description(&self) -> &str {
        "Search for information about party invites and people who might attend. Returns relevant people with relationships and contact details. Args: {\"query\": \"people, relationships or party attendees\"}."
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = require_str_arg(&args, "query")?;

        let hits = self.index.search(&query, self.top_k).await;
        if hits.is_empty() {
            return Ok(ToolOutput::Text(
                "No relevant information found in the party invites database.".to_string(),
            ));
        }

        let mut results = Vec::new();
        for (i, hit) in hits.iter().enumerate() {
            results.push(format!("Result {}:", i + 1));
            results.push(format!("Content: {}", hit.content));
            results.push(format!("Relevance Score: {:.3}", hit.score));
            results.push(format!(
                "Metadata: {{\"name\": \"{}\", \"relation\": \"{}\", \"email\": \"{}\"}}",
                hit.name, hit.relation, hit.email
            ));
            results.push("---".to_string());
        }
        Ok(ToolOutput::Text(results.join("\n")))
    }
}
