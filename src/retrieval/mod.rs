//! 宾客邀请检索：数据加载、向量/关键词打分、Top-K 排序

pub mod index;

pub use index::{load_guest_records, GuestRecord, InviteIndex, RetrievalHit};
