//! 组件装配
//!
//! 供 CLI / HTTP 前端调用：从配置构建 LLM 客户端、宾客索引、工具箱、
//! 线程存储与 TurnController。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{create_embedder_from_config, OpenAiClient};
use crate::retrieval::{load_guest_records, InviteIndex};
use crate::store::{FileThreadStore, InMemoryThreadStore, ThreadStore};
use crate::tools::{
    HumanAssistanceTool, RetrievalTool, ToolCatalogTool, ToolExecutor, ToolRegistry, WebSearchTool,
};
use crate::turn::TurnController;

/// 默认系统提示（config/prompts/system.md 缺失时使用）
const DEFAULT_SYSTEM_PROMPT: &str = "You are an advanced Party Planning Assistant with persistent memory. \
You remember previous conversations in this thread. Use the retrieval tool to look up party guests, \
web_search for current information, and human_assistance for complex decisions that need a human.";

/// 预构建的组件：TurnController 与其注入的线程存储
pub struct AgentComponents {
    pub controller: Arc<TurnController>,
}

impl AgentComponents {
    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        self.controller.store()
    }
}

/// 读取系统提示文件，不存在则用内置提示
fn load_system_prompt() -> String {
    [
        "config/prompts/system.md",
        "../config/prompts/system.md",
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// 创建线程存储：配置了 threads_dir 用文件快照，否则纯内存
fn create_store(cfg: &AppConfig) -> Arc<dyn ThreadStore> {
    if let Some(dir) = &cfg.app.threads_dir {
        match FileThreadStore::new(dir.clone()) {
            Ok(store) => return Arc::new(store),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "file store unavailable, falling back to memory");
            }
        }
    }
    Arc::new(InMemoryThreadStore::new())
}

/// 创建全部组件：LLM、嵌入、宾客索引、四个工具、存储、控制器
pub async fn create_agent_components(cfg: &AppConfig) -> AgentComponents {
    let llm = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        None,
    ));

    let embedder = create_embedder_from_config(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.embedding_model,
        None,
    );

    let records = match load_guest_records(&cfg.tools.retrieval.data_file) {
        Ok(r) => r,
        Err(e) => {
            // 数据缺失不致命：检索工具将报告无结果
            tracing::warn!(error = %e, "guest data unavailable, retrieval index is empty");
            Vec::new()
        }
    };
    let index = Arc::new(InviteIndex::build(records, embedder).await);
    tracing::info!(guests = index.len(), "invite index ready");

    let mut registry = ToolRegistry::new();
    registry.register(WebSearchTool::new(&cfg.tools.web_search));
    registry.register(RetrievalTool::new(
        Arc::clone(&index),
        cfg.tools.retrieval.top_k,
    ));
    registry.register(HumanAssistanceTool);
    registry.register(ToolCatalogTool::new(&cfg.tools.catalog));

    let executor = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);
    let store = create_store(cfg);

    AgentComponents {
        controller: Arc::new(TurnController::new(
            llm,
            executor,
            store,
            load_system_prompt(),
            cfg.turn.max_iterations,
        )),
    }
}
