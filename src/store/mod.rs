//! 线程存储：消息日志 + 挂起中断
//!
//! 线程状态（消息序列与至多一个 PendingInterrupt）是对话的全部持久状态，
//! 由显式注入的 ThreadStore 管理，而非进程级全局变量。

pub mod file_store;
pub mod memory_store;
pub mod thread;

pub use file_store::FileThreadStore;
pub use memory_store::InMemoryThreadStore;
pub use thread::{Message, PendingInterrupt, ThreadState, ToolCallRequest};

use async_trait::async_trait;
use thiserror::Error;

/// 存储层错误（线程不存在不是错误，load 返回 Ok(None)）
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot parse error: {0}")]
    Parse(String),
}

/// 线程状态存取接口：get / put / 查询挂起中断
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// 读取线程状态；线程不存在返回 Ok(None)
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError>;

    /// 整体写回线程状态（线程不存在则创建）
    async fn save(&self, thread_id: &str, state: ThreadState) -> Result<(), StoreError>;

    /// O(1) 查询挂起中断；线程不存在返回 Ok(None)
    async fn pending_interrupt(
        &self,
        thread_id: &str,
    ) -> Result<Option<PendingInterrupt>, StoreError> {
        Ok(self.load(thread_id).await?.and_then(|s| s.pending))
    }
}

/// 查询线程是否挂起等待人工输入。
///
/// 线程不存在视为未挂起；存储访问失败同样降级为未挂起，但会以 warn 记录
/// 底层错误，与「线程不存在」明确区分开。
pub async fn is_suspended(store: &dyn ThreadStore, thread_id: &str) -> bool {
    match store.pending_interrupt(thread_id).await {
        Ok(pending) => pending.is_some(),
        Err(e) => {
            tracing::warn!(thread_id = %thread_id, error = %e, "store lookup failed, reporting not suspended");
            false
        }
    }
}

/// 读取线程最近 max 条消息；线程不存在或存储失败降级为空历史
/// （失败同样记 warn，与不存在区分）。
pub async fn recent_messages(
    store: &dyn ThreadStore,
    thread_id: &str,
    max: usize,
) -> Vec<Message> {
    match store.load(thread_id).await {
        Ok(Some(state)) => {
            let skip = state.messages.len().saturating_sub(max);
            state.messages.into_iter().skip(skip).collect()
        }
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(thread_id = %thread_id, error = %e, "store lookup failed, reporting empty history");
            Vec::new()
        }
    }
}
