//! Turn Controller
//!
//! 单回合：人类输入入日志 -> 调模型 -> 有工具调用则按请求顺序逐个执行并写回
//! 结果 -> 再调模型，直到模型不再请求工具（最终回答）、human_assistance 挂起
//! 回合、或步数预算（2*max_iterations+1 次模型/工具交替）用尽。
//!
//! 挂起以显式续体记录（PendingInterrupt）落在线程状态里：resume 把人工答复
//! 注入为对应调用的 tool 结果，补完同批未执行的调用后从保存的步数继续循环。
//! 模型与工具调用都不做自动重试；工具失败转为 `Error: ...` 文本写回对话。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::store::{Message, PendingInterrupt, ThreadState, ThreadStore, ToolCallRequest};
use crate::tools::{ToolExecutor, ToolOutput};

/// 一次回合驱动的结果
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// 模型给出最终回答，回合结束
    Completed { reply: String },
    /// 回合挂起，等待人工对 query 的答复
    WaitingForInput { query: String },
}

/// 回合控制器：持有 LLM、工具执行器与注入的线程存储
pub struct TurnController {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    store: Arc<dyn ThreadStore>,
    system_prompt: String,
    max_iterations: usize,
}

impl TurnController {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        store: Arc<dyn ThreadStore>,
        system_prompt: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            executor,
            store,
            system_prompt: system_prompt.into(),
            max_iterations,
        }
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        &self.store
    }

    /// 单回合步数预算：每次模型调用与每轮工具执行各计一步
    fn max_steps(&self) -> usize {
        2 * self.max_iterations + 1
    }

    /// 驱动一个回合：追加人类输入并循环到最终回答 / 挂起 / 步数超限。
    /// 线程已挂起时不接受新输入，原样返回待答复的 query。
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_input: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let mut state = match self.store.load(thread_id).await {
            Ok(Some(s)) => s,
            Ok(None) => ThreadState::default(),
            Err(e) => {
                // 存储不可用降级为全新线程，但要留下痕迹（与线程不存在区分）
                tracing::warn!(thread_id = %thread_id, error = %e, "store load failed, starting from empty state");
                ThreadState::default()
            }
        };

        if let Some(pending) = &state.pending {
            tracing::info!(thread_id = %thread_id, "thread suspended, input rejected until resume");
            return Ok(TurnOutcome::WaitingForInput {
                query: pending.query.clone(),
            });
        }

        if !state
            .messages
            .iter()
            .any(|m| matches!(m, Message::System { .. }))
        {
            state.messages.push(Message::system(self.system_prompt.clone()));
        }
        state.messages.push(Message::human(user_input));

        self.drive(thread_id, state, 0).await
    }

    /// 恢复挂起的回合：把人工答复注入为 human_assistance 调用的结果，
    /// 补完同批剩余调用，再从保存的步数继续循环。
    /// 线程无挂起中断时拒绝且不改动消息历史。
    pub async fn resume(&self, thread_id: &str, answer: &str) -> Result<TurnOutcome, AgentError> {
        let mut state = match self.store.load(thread_id).await {
            Ok(Some(s)) => s,
            Ok(None) => return Err(AgentError::NoPendingInterrupt(thread_id.to_string())),
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "store load failed, treating thread as not suspended");
                return Err(AgentError::NoPendingInterrupt(thread_id.to_string()));
            }
        };

        let pending = state
            .pending
            .take()
            .ok_or_else(|| AgentError::NoPendingInterrupt(thread_id.to_string()))?;

        state.messages.push(Message::tool_result(
            &pending.call_id,
            crate::tools::HUMAN_ASSISTANCE,
            answer,
        ));

        // 同一条助手消息里排在挂起调用之后、尚未执行的调用，按请求顺序补完
        let owner_calls: Vec<ToolCallRequest> = state
            .calls_of_assistant_owning(&pending.call_id)
            .map(|calls| calls.to_vec())
            .unwrap_or_default();
        for call in &owner_calls {
            if state.call_resolved(&call.id) {
                continue;
            }
            if let Some(query) = self
                .dispatch_call(&mut state, call, pending.steps_used)
                .await
            {
                self.store.save(thread_id, state).await?;
                return Ok(TurnOutcome::WaitingForInput { query });
            }
        }

        self.drive(thread_id, state, pending.steps_used).await
    }

    /// 主循环；steps 为本回合已消耗步数（恢复时从挂起点继续计数）
    async fn drive(
        &self,
        thread_id: &str,
        mut state: ThreadState,
        mut steps: usize,
    ) -> Result<TurnOutcome, AgentError> {
        let max_steps = self.max_steps();
        let tools = self.executor.tool_specs();

        loop {
            if steps >= max_steps {
                self.store.save(thread_id, state).await?;
                return Err(AgentError::IterationLimitExceeded { limit: max_steps });
            }
            steps += 1;

            let turn = match self.llm.complete(&state.messages, &tools).await {
                Ok(t) => t,
                Err(e) => {
                    // 不重试；已追加的消息原样保留
                    self.store.save(thread_id, state).await?;
                    return Err(AgentError::LlmError(e));
                }
            };
            state.messages.push(Message::assistant_with_calls(
                turn.content.clone(),
                turn.tool_calls.clone(),
            ));

            if turn.tool_calls.is_empty() {
                self.store.save(thread_id, state).await?;
                return Ok(TurnOutcome::Completed {
                    reply: turn.content,
                });
            }

            if steps >= max_steps {
                self.store.save(thread_id, state).await?;
                return Err(AgentError::IterationLimitExceeded { limit: max_steps });
            }
            steps += 1;

            for call in &turn.tool_calls {
                if let Some(query) = self.dispatch_call(&mut state, call, steps).await {
                    self.store.save(thread_id, state).await?;
                    return Ok(TurnOutcome::WaitingForInput { query });
                }
            }
        }
    }

    /// 执行单个工具调用并写回结果；返回 Some(query) 表示本调用请求挂起
    /// （PendingInterrupt 已记入 state，落盘由调用方完成）
    async fn dispatch_call(
        &self,
        state: &mut ThreadState,
        call: &ToolCallRequest,
        steps_used: usize,
    ) -> Option<String> {
        match self.executor.execute(&call.name, call.args.clone()).await {
            Ok(ToolOutput::Text(text)) => {
                state
                    .messages
                    .push(Message::tool_result(&call.id, &call.name, text));
                None
            }
            Ok(ToolOutput::NeedsHuman { query }) => {
                state.pending = Some(PendingInterrupt {
                    query: query.clone(),
                    call_id: call.id.clone(),
                    steps_used,
                });
                Some(query)
            }
            Err(e) => {
                // 工具失败写回 observation，回合继续
                state
                    .messages
                    .push(Message::tool_result(&call.id, &call.name, format!("Error: {}", e)));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AssistantTurn, MockLlmClient};
    use crate::store::InMemoryThreadStore;
    use crate::tools::{
        HumanAssistanceTool, Tool, ToolError, ToolRegistry,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the query"
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
            let text = args
                .get("query")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Ok(ToolOutput::Text(format!("echo: {}", text)))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Backend("boom".into()))
        }
    }

    fn call(id: &str, name: &str, query: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            args: serde_json::json!({ "query": query }),
        }
    }

    fn controller(
        turns: Vec<AssistantTurn>,
        store: Arc<dyn ThreadStore>,
        max_iterations: usize,
    ) -> TurnController {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(FailingTool);
        registry.register(HumanAssistanceTool);
        TurnController::new(
            Arc::new(MockLlmClient::with_turns(turns)),
            ToolExecutor::new(registry, 5),
            store,
            "You are a party planning assistant.",
            max_iterations,
        )
    }

    #[tokio::test]
    async fn plain_answer_completes_in_one_step() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![AssistantTurn::text("Let's plan it!")],
            Arc::clone(&store),
            3,
        );
        let outcome = ctrl.run_turn("t1", "help me plan").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                reply: "Let's plan it!".into()
            }
        );

        let state = store.load("t1").await.unwrap().unwrap();
        assert!(state.pending.is_none());
        // system + human + assistant，且结尾恰好一条无工具调用的助手消息
        assert_eq!(state.messages.len(), 3);
        match state.messages.last().unwrap() {
            Message::Assistant {
                content,
                tool_calls,
            } => {
                assert_eq!(content, "Let's plan it!");
                assert!(tool_calls.is_empty());
            }
            other => panic!("unexpected last message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn system_prompt_prefixed_only_once() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![AssistantTurn::text("one"), AssistantTurn::text("two")],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "first").await.unwrap();
        ctrl.run_turn("t1", "second").await.unwrap();
        let state = store.load("t1").await.unwrap().unwrap();
        let system_count = state
            .messages
            .iter()
            .filter(|m| matches!(m, Message::System { .. }))
            .count();
        assert_eq!(system_count, 1);
    }

    #[tokio::test]
    async fn tool_call_result_is_appended_in_order() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls(
                    "",
                    vec![call("c1", "echo", "a"), call("c2", "echo", "b")],
                ),
                AssistantTurn::text("done"),
            ],
            Arc::clone(&store),
            3,
        );
        let outcome = ctrl.run_turn("t1", "go").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { reply: "done".into() });

        let state = store.load("t1").await.unwrap().unwrap();
        let roles: Vec<&str> = state.messages.iter().map(|m| m.role()).collect();
        assert_eq!(
            roles,
            vec!["system", "human", "assistant", "tool", "tool", "assistant"]
        );
        match &state.messages[3] {
            Message::ToolResult {
                call_id, content, ..
            } => {
                assert_eq!(call_id, "c1");
                assert_eq!(content, "echo: a");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn tool_failure_becomes_observation_not_fatal() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls("", vec![call("c1", "failing", "x")]),
                AssistantTurn::text("recovered"),
            ],
            Arc::clone(&store),
            3,
        );
        let outcome = ctrl.run_turn("t1", "go").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                reply: "recovered".into()
            }
        );
        let state = store.load("t1").await.unwrap().unwrap();
        let tool_msg = state
            .messages
            .iter()
            .find(|m| m.role() == "tool")
            .unwrap();
        assert!(tool_msg.content().starts_with("Error: "));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls("", vec![call("c1", "made_up", "x")]),
                AssistantTurn::text("ok")
            ],
            Arc::clone(&store),
            3,
        );
        let outcome = ctrl.run_turn("t1", "go").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { reply: "ok".into() });
        let state = store.load("t1").await.unwrap().unwrap();
        let tool_msg = state.messages.iter().find(|m| m.role() == "tool").unwrap();
        assert!(tool_msg.content().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn human_assistance_suspends_turn() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![AssistantTurn::with_calls(
                "",
                vec![call("c1", "human_assistance", "DJ or band?")],
            )],
            Arc::clone(&store),
            3,
        );
        let outcome = ctrl.run_turn("t1", "music?").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::WaitingForInput {
                query: "DJ or band?".into()
            }
        );

        let pending = store.pending_interrupt("t1").await.unwrap().unwrap();
        assert_eq!(pending.query, "DJ or band?");
        assert_eq!(pending.call_id, "c1");
        assert!(crate::store::is_suspended(store.as_ref(), "t1").await);
    }

    #[tokio::test]
    async fn suspended_thread_rejects_new_input_without_mutation() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![AssistantTurn::with_calls(
                "",
                vec![call("c1", "human_assistance", "which venue?")],
            )],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "venue?").await.unwrap();
        let before = store.load("t1").await.unwrap().unwrap();

        let outcome = ctrl.run_turn("t1", "another question").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::WaitingForInput {
                query: "which venue?".into()
            }
        );
        let after = store.load("t1").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn resume_injects_answer_and_continues() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls(
                    "",
                    vec![call("c1", "human_assistance", "who to invite?")],
                ),
                AssistantTurn::text("Great, John is on the list."),
            ],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "invites?").await.unwrap();

        let outcome = ctrl.resume("t1", "Invite John").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                reply: "Great, John is on the list.".into()
            }
        );

        let state = store.load("t1").await.unwrap().unwrap();
        assert!(state.pending.is_none());
        assert!(!crate::store::is_suspended(store.as_ref(), "t1").await);
        // 人工答复原文成为 human_assistance 调用的结果，其后是新的助手消息
        let idx = state
            .messages
            .iter()
            .position(|m| {
                matches!(m, Message::ToolResult { call_id, content, .. }
                    if call_id == "c1" && content == "Invite John")
            })
            .unwrap();
        assert_eq!(state.messages[idx + 1].role(), "assistant");
    }

    #[tokio::test]
    async fn resume_without_pending_is_rejected_without_mutation() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![AssistantTurn::text("hi")],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "hello").await.unwrap();
        let before = store.load("t1").await.unwrap().unwrap();

        let err = ctrl.resume("t1", "answer").await.unwrap_err();
        assert!(matches!(err, AgentError::NoPendingInterrupt(_)));
        // 再来一次同样失败，历史不变
        let err = ctrl.resume("t1", "answer").await.unwrap_err();
        assert!(matches!(err, AgentError::NoPendingInterrupt(_)));
        assert_eq!(store.load("t1").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn resume_unknown_thread_is_rejected() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(vec![], Arc::clone(&store), 3);
        let err = ctrl.resume("ghost", "answer").await.unwrap_err();
        assert!(matches!(err, AgentError::NoPendingInterrupt(_)));
    }

    #[tokio::test]
    async fn resume_finishes_remaining_calls_of_same_batch() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls(
                    "",
                    vec![
                        call("c1", "human_assistance", "ask first"),
                        call("c2", "echo", "after resume"),
                    ],
                ),
                AssistantTurn::text("all done"),
            ],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "go").await.unwrap();
        let outcome = ctrl.resume("t1", "fine").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { reply: "all done".into() });

        let state = store.load("t1").await.unwrap().unwrap();
        let tool_contents: Vec<&str> = state
            .messages
            .iter()
            .filter(|m| m.role() == "tool")
            .map(|m| m.content())
            .collect();
        assert_eq!(tool_contents, vec!["fine", "echo: after resume"]);
    }

    #[tokio::test]
    async fn iteration_cap_is_fatal_after_budget() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        // 模型永远请求工具：预算 2*3+1=7 步后报错，不产生最终回答
        let always_tool: Vec<AssistantTurn> = (0..10)
            .map(|i| {
                AssistantTurn::with_calls("", vec![call(&format!("c{}", i), "echo", "again")])
            })
            .collect();
        let ctrl = controller(always_tool, Arc::clone(&store), 3);

        let err = ctrl.run_turn("t1", "loop forever").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::IterationLimitExceeded { limit: 7 }
        ));

        // 回合内恰好 7 条模型/工具消息（4 次模型调用 + 3 轮工具），状态保留
        let state = store.load("t1").await.unwrap().unwrap();
        let appended = state
            .messages
            .iter()
            .filter(|m| matches!(m.role(), "assistant" | "tool"))
            .count();
        assert_eq!(appended, 7);
        assert!(state.pending.is_none());
    }

    #[tokio::test]
    async fn step_budget_spans_suspend_and_resume() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        // 挂起前消耗 2 步；恢复后模型继续索要工具，预算应在 7 步处用尽
        let mut turns = vec![AssistantTurn::with_calls(
            "",
            vec![call("h1", "human_assistance", "q")],
        )];
        turns.extend((0..10).map(|i| {
            AssistantTurn::with_calls("", vec![call(&format!("r{}", i), "echo", "x")])
        }));
        let ctrl = controller(turns, Arc::clone(&store), 3);

        ctrl.run_turn("t1", "go").await.unwrap();
        let err = ctrl.resume("t1", "ok").await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimitExceeded { limit: 7 }));
    }

    #[tokio::test]
    async fn independent_threads_do_not_share_state() {
        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let ctrl = controller(
            vec![
                AssistantTurn::with_calls(
                    "",
                    vec![call("c1", "human_assistance", "q1")],
                ),
                AssistantTurn::text("t2 answer"),
            ],
            Arc::clone(&store),
            3,
        );
        ctrl.run_turn("t1", "suspend me").await.unwrap();
        let outcome = ctrl.run_turn("t2", "normal").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { reply: "t2 answer".into() });
        assert!(crate::store::is_suspended(ctrl.store().as_ref(), "t1").await);
        assert!(!crate::store::is_suspended(ctrl.store().as_ref(), "t2").await);
    }

    #[tokio::test]
    async fn llm_error_propagates_without_retry() {
        struct FailingLlm;

        #[async_trait]
        impl crate::llm::LlmClient for FailingLlm {
            async fn complete(
                &self,
                _messages: &[Message],
                _tools: &[crate::llm::ToolSpec],
            ) -> Result<AssistantTurn, String> {
                Err("connection refused".into())
            }
        }

        let store: Arc<dyn ThreadStore> = Arc::new(InMemoryThreadStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let ctrl = TurnController::new(
            Arc::new(FailingLlm),
            ToolExecutor::new(registry, 5),
            Arc::clone(&store),
            "prompt",
            3,
        );
        let err = ctrl.run_turn("t1", "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(_)));
        // 已追加的人类消息保留，无部分回滚
        let state = store.load("t1").await.unwrap().unwrap();
        assert_eq!(state.messages.last().unwrap().role(), "human");
    }
}
