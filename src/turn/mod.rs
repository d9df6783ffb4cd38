//! 回合驱动：Turn Controller 主循环与中断/恢复

pub mod controller;

pub use controller::{TurnController, TurnOutcome};
