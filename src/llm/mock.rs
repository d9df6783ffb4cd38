//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本顺序回放 AssistantTurn；脚本耗尽后回显最后一条 Human 消息，
//! 便于在无网络环境跑通完整回合循环。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{AssistantTurn, LlmClient, ToolSpec};
use crate::store::Message;

/// Mock 客户端：逐条弹出预置回合
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<AssistantTurn>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置回放脚本
    pub fn with_turns(turns: Vec<AssistantTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
        }
    }

    /// 追加一条脚本回合
    pub fn push_turn(&self, turn: AssistantTurn) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(turn);
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<AssistantTurn, String> {
        if let Ok(mut script) = self.script.lock() {
            if let Some(turn) = script.pop_front() {
                return Ok(turn);
            }
        }

        let last_human = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::Human { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or("(no input)");
        Ok(AssistantTurn::text(format!("Echo from Mock: {}", last_human)))
    }
}
