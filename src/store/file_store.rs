//! JSON 文件线程存储
//!
//! 每个线程一个快照文件 {threads_dir}/{thread_id}.json，文件名中的
//! 非常规字符替换为下划线。读取失败（文件损坏）作为 StoreError 上抛，
//! 由调用方按「存储不可用」降级处理。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::store::{StoreError, ThreadState, ThreadStore};

/// 文件存储：线程状态以 JSON 快照落盘，重启后可恢复
pub struct FileThreadStore {
    dir: PathBuf,
}

impl FileThreadStore {
    /// 创建存储并确保目录存在
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        let safe_id: String = thread_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe_id))
    }
}

fn read_snapshot(path: &Path) -> Result<Option<ThreadState>, StoreError> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let state = serde_json::from_str(&data)
        .map_err(|e| StoreError::Parse(format!("{}: {}", path.display(), e)))?;
    Ok(Some(state))
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError> {
        let path = self.thread_path(thread_id);
        tokio::task::spawn_blocking(move || read_snapshot(&path))
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?
    }

    async fn save(&self, thread_id: &str, state: ThreadState) -> Result<(), StoreError> {
        let path = self.thread_path(thread_id);
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        tokio::task::spawn_blocking(move || std::fs::write(&path, json))
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))??;
        Ok(())
    }
}
