//! 内存线程存储
//!
//! 状态保存在进程内存，进程退出即丢失。线程间相互独立，
//! 读写经 RwLock<HashMap>，不同线程 id 的操作无需协调。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{PendingInterrupt, StoreError, ThreadState, ThreadStore};

/// 内存存储：thread_id -> ThreadState
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<String, ThreadState>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: ThreadState) -> Result<(), StoreError> {
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), state);
        Ok(())
    }

    async fn pending_interrupt(
        &self,
        thread_id: &str,
    ) -> Result<Option<PendingInterrupt>, StoreError> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .and_then(|s| s.pending.clone()))
    }
}
