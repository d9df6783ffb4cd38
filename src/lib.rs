//! Fiesta - Rust 派对策划智能体
//!
//! 模块划分：
//! - **agent**: 组件装配（LLM、工具、线程存储、Turn Controller），供 CLI / HTTP 共用
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 回合循环错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、嵌入
//! - **retrieval**: 宾客邀请数据的语义检索索引
//! - **store**: 对话线程存储（消息日志 + 挂起中断），内存 / JSON 文件两种后端
//! - **tools**: 工具箱（web_search、retrieval、human_assistance、tool_catalog）与执行器
//! - **turn**: Turn Controller 主循环与中断/恢复

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod retrieval;
pub mod store;
pub mod tools;
pub mod turn;
