//! 线程内消息类型
//!
//! 消息为带标签的和类型（system / human / assistant / tool），assistant 消息可携带
//! 若干待执行的工具调用请求，tool 消息通过 call_id 对应其中一条。

use serde::{Deserialize, Serialize};

/// 助手消息中的一条工具调用请求；在对应的 ToolResult 落盘前归该条助手消息所有
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// 调用 id，结果消息以此回链
    pub id: String,
    /// 工具名（固定工具集之一）
    pub name: String,
    /// JSON 参数
    pub args: serde_json::Value,
}

/// 单条消息（与导出的会话历史一致，type 标签为小写角色名）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    Human {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        call_id: String,
        tool: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            tool: tool.into(),
            content: content.into(),
        }
    }

    /// 小写角色标签（system / human / assistant / tool），与序列化 type 一致
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::Human { .. } => "human",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::Human { content }
            | Message::Assistant { content, .. }
            | Message::ToolResult { content, .. } => content,
        }
    }
}

/// 挂起中断：human_assistance 执行时创建，resume 时销毁；每线程至多一个
///
/// 这是显式的续体记录：挂起的工具调用 id 指向消息日志中对应的助手消息，
/// steps_used 保存挂起时的步数计数，恢复后步数预算跨越挂起点继续累计。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// 展示给人工的问题文本
    pub query: String,
    /// 等待结果的 human_assistance 调用 id
    pub call_id: String,
    /// 挂起时已消耗的回合步数
    pub steps_used: usize,
}

/// 线程状态：严格按插入序的消息日志 + 可选挂起中断
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingInterrupt>,
}

impl ThreadState {
    /// 在消息日志中查找拥有指定调用 id 的助手消息，返回其全部工具调用请求
    pub fn calls_of_assistant_owning(&self, call_id: &str) -> Option<&[ToolCallRequest]> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant { tool_calls, .. }
                if tool_calls.iter().any(|c| c.id == call_id) =>
            {
                Some(tool_calls.as_slice())
            }
            _ => None,
        })
    }

    /// 指定调用 id 是否已有对应的 ToolResult
    pub fn call_resolved(&self, call_id: &str) -> bool {
        self.messages.iter().any(|m| {
            matches!(m, Message::ToolResult { call_id: cid, .. } if cid == call_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tags_match_serialized_type() {
        let msgs = vec![
            Message::system("s"),
            Message::human("h"),
            Message::assistant("a"),
            Message::tool_result("c1", "retrieval", "r"),
        ];
        for m in &msgs {
            let v = serde_json::to_value(m).unwrap();
            assert_eq!(v["type"].as_str().unwrap(), m.role());
        }
    }

    #[test]
    fn assistant_without_calls_omits_field() {
        let v = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert!(v.get("tool_calls").is_none());
    }

    #[test]
    fn snapshot_round_trip() {
        let state = ThreadState {
            messages: vec![
                Message::human("who comes?"),
                Message::assistant_with_calls(
                    "",
                    vec![ToolCallRequest {
                        id: "call_1".into(),
                        name: "retrieval".into(),
                        args: serde_json::json!({"query": "friends"}),
                    }],
                ),
            ],
            pending: Some(PendingInterrupt {
                query: "which venue?".into(),
                call_id: "call_1".into(),
                steps_used: 2,
            }),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: ThreadState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn finds_owning_assistant_and_resolution() {
        let state = ThreadState {
            messages: vec![
                Message::assistant_with_calls(
                    "",
                    vec![
                        ToolCallRequest {
                            id: "c1".into(),
                            name: "web_search".into(),
                            args: serde_json::json!({}),
                        },
                        ToolCallRequest {
                            id: "c2".into(),
                            name: "human_assistance".into(),
                            args: serde_json::json!({}),
                        },
                    ],
                ),
                Message::tool_result("c1", "web_search", "ok"),
            ],
            pending: None,
        };
        let calls = state.calls_of_assistant_owning("c2").unwrap();
        assert_eq!(calls.len(), 2);
        assert!(state.call_resolved("c1"));
        assert!(!state.call_resolved("c2"));
    }
}
