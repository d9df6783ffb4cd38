//! Agent 错误类型
//!
//! 回合循环中的可恢复边界在工具层（失败转为 observation 文本），这里只保留
//! 对调用方致命的错误：LLM 调用失败、步数超限、无效恢复、存储写入失败。
//! 任何错误都不触发自动重试。

use thiserror::Error;

use crate::store::StoreError;

/// 回合驱动过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 单回合步数预算（2*max_iterations+1 次模型/工具交替）用尽仍未得到最终回答
    #[error("Iteration limit exceeded after {limit} steps")]
    IterationLimitExceeded { limit: usize },

    /// 线程当前没有挂起的中断，恢复请求被拒绝
    #[error("No pending interruption for thread {0}")]
    NoPendingInterrupt(String),

    #[error("Thread store error: {0}")]
    Store(#[from] StoreError),
}
