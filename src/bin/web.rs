//! Fiesta HTTP API
//!
//! 启动: cargo run --bin fiesta-web
//! 端点: POST /chat、POST /resume、GET /conversation/:thread_id、GET /status/:thread_id

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fiesta::agent::{create_agent_components, AgentComponents};
use fiesta::config::load_config;
use fiesta::core::AgentError;
use fiesta::store::{is_suspended, recent_messages, Message};
use fiesta::turn::TurnOutcome;

const DEFAULT_MAX_MESSAGES: usize = 10;

struct AppState {
    components: AgentComponents,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_thread_id")]
    thread_id: String,
}

fn default_thread_id() -> String {
    "1".to_string()
}

#[derive(Debug, Deserialize)]
struct ResumeRequest {
    response_data: String,
    #[serde(default = "default_thread_id")]
    thread_id: String,
}

#[derive(Debug, Serialize)]
struct HistoryItem {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    thread_id: String,
    status: String,
    conversation_history: Vec<HistoryItem>,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    thread_id: String,
    conversation_history: Vec<HistoryItem>,
    message_count: usize,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    thread_id: String,
    waiting_for_input: bool,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ConversationQuery {
    #[serde(default = "default_max_messages")]
    max_messages: usize,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

/// 将消息映射为导出历史项；system 内容打码，tool 只报执行过的工具名
fn history_items(messages: &[Message]) -> Vec<HistoryItem> {
    let now = chrono::Local::now().to_rfc3339();
    messages
        .iter()
        .map(|m| {
            let content = match m {
                Message::System { .. } => "[System message]".to_string(),
                Message::ToolResult { tool, .. } => format!("Tool ({}) executed", tool),
                other => other.content().to_string(),
            };
            HistoryItem {
                kind: m.role().to_string(),
                content,
                timestamp: now.clone(),
            }
        })
        .collect()
}

async fn load_history(state: &AppState, thread_id: &str) -> Vec<HistoryItem> {
    let messages = recent_messages(
        state.components.store().as_ref(),
        thread_id,
        DEFAULT_MAX_MESSAGES,
    )
    .await;
    history_items(&messages)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_default();
    let components = create_agent_components(&cfg).await;
    let state = Arc::new(AppState { components });

    let app = Router::new()
        .route("/", get(root))
        .route("/chat", post(api_chat))
        .route("/resume", post(api_resume))
        .route("/conversation/:thread_id", get(api_conversation))
        .route("/status/:thread_id", get(api_status))
        .with_state(Arc::clone(&state));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.web.port));
    tracing::info!("Party Planning Chatbot API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /：健康检查
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Party Planning Chatbot API is running!",
        "status": "healthy",
    }))
}

/// POST /chat：驱动一个回合；挂起时返回 waiting_for_input，错误转为 status=error
async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let (response, status) = match state
        .components
        .controller
        .run_turn(&req.thread_id, &req.message)
        .await
    {
        Ok(TurnOutcome::Completed { reply }) => (reply, "completed".to_string()),
        Ok(TurnOutcome::WaitingForInput { .. }) => (
            "I need some additional information. Please provide more details.".to_string(),
            "waiting_for_input".to_string(),
        ),
        Err(e) => {
            tracing::error!(thread_id = %req.thread_id, error = %e, "chat turn failed");
            (format!("An error occurred: {}", e), "error".to_string())
        }
    };

    let conversation_history = load_history(&state, &req.thread_id).await;
    Json(ChatResponse {
        response,
        thread_id: req.thread_id,
        status,
        conversation_history,
    })
}

/// POST /resume：无挂起中断返回 400，否则恢复并返回续接结果
async fn api_resume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let outcome = state
        .components
        .controller
        .resume(&req.thread_id, &req.response_data)
        .await;

    let (response, status) = match outcome {
        Ok(TurnOutcome::Completed { reply }) => (reply, "completed".to_string()),
        Ok(TurnOutcome::WaitingForInput { .. }) => (
            "I need some additional information. Please provide more details.".to_string(),
            "waiting_for_input".to_string(),
        ),
        Err(AgentError::NoPendingInterrupt(_)) => {
            return Err((StatusCode::BAD_REQUEST, "No interruption to resume".to_string()));
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error resuming conversation: {}", e),
            ));
        }
    };

    let conversation_history = load_history(&state, &req.thread_id).await;
    Ok(Json(ChatResponse {
        response,
        thread_id: req.thread_id,
        status,
        conversation_history,
    }))
}

/// GET /conversation/:thread_id?max_messages=N：最近 N 条消息，带角色标签
async fn api_conversation(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(q): Query<ConversationQuery>,
) -> Json<ConversationResponse> {
    let messages = recent_messages(
        state.components.store().as_ref(),
        &thread_id,
        q.max_messages,
    )
    .await;
    let conversation_history = history_items(&messages);
    let message_count = conversation_history.len();
    Json(ConversationResponse {
        thread_id,
        conversation_history,
        message_count,
    })
}

/// GET /status/:thread_id：线程是否在等待人工输入
async fn api_status(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Json<StatusResponse> {
    let waiting = is_suspended(state.components.store().as_ref(), &thread_id).await;
    Json(StatusResponse {
        thread_id,
        waiting_for_input: waiting,
        status: if waiting { "waiting_for_input" } else { "ready" }.to_string(),
    })
}
