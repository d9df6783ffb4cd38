//! 宾客邀请索引
//!
//! 记录来自 JSON 数据文件（name / relation / description / email），渲染为
//! 单段文本后参与打分：配置了嵌入时用余弦相似度（截断到 [0,1]），否则用
//! 关键词 Jaccard 重合度。两种路径的分数都有界且按非递增排序返回。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;

/// 一条宾客记录（数据文件中的一项）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub name: String,
    pub relation: String,
    pub description: String,
    pub email: String,
}

impl GuestRecord {
    /// 渲染为检索文本（与入库格式一致）
    pub fn render(&self) -> String {
        format!(
            "Name: {}\nRelation: {}\nDescription: {}\nEmail: {}",
            self.name, self.relation, self.description, self.email
        )
    }
}

/// 单条检索命中：文本、[0,1] 相关度分数、记录元数据
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub content: String,
    pub score: f32,
    pub name: String,
    pub relation: String,
    pub email: String,
}

/// 从 JSON 文件加载宾客记录；文件缺失或格式错误返回 Err 由调用方决定降级
pub fn load_guest_records(path: &Path) -> Result<Vec<GuestRecord>, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("read {}: {}", path.display(), e))?;
    serde_json::from_str(&data).map_err(|e| format!("parse {}: {}", path.display(), e))
}

struct Entry {
    record: GuestRecord,
    text: String,
    embedding: Option<Vec<f32>>,
}

/// 宾客检索索引：构建时一次性嵌入全部记录，查询时只嵌入 query
pub struct InviteIndex {
    entries: Vec<Entry>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl InviteIndex {
    /// 构建索引；嵌入失败的记录退化为关键词打分，不中断构建
    pub async fn build(
        records: Vec<GuestRecord>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let text = record.render();
            let embedding = match &embedder {
                Some(e) => match e.embed(&text).await {
                    Ok(v) if !v.is_empty() => Some(v),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!(name = %record.name, error = %err, "guest embedding failed, keyword fallback");
                        None
                    }
                },
                None => None,
            };
            entries.push(Entry {
                record,
                text,
                embedding,
            });
        }
        Self { entries, embedder }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 检索最相关的 k 条记录，分数非递增，score ∈ [0,1]
    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalHit> {
        if self.entries.is_empty() || query.trim().is_empty() {
            return Vec::new();
        }

        let query_embedding = match &self.embedder {
            Some(e) => match e.embed(query).await {
                Ok(v) if !v.is_empty() => Some(v),
                _ => None,
            },
            None => None,
        };

        let query_tokens = tokenize_to_set(query);
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| {
                let score = match (&query_embedding, &entry.embedding) {
                    (Some(q), Some(d)) => cosine_similarity(q, d).clamp(0.0, 1.0),
                    _ => jaccard_similarity(&query_tokens, &tokenize_to_set(&entry.text)),
                };
                (score, entry)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievalHit {
                content: entry.text.clone(),
                score,
                name: entry.record.name.clone(),
                relation: entry.record.relation.clone(),
                email: entry.record.email.clone(),
            })
            .collect()
    }
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// 分词：小写、按非字母数字切分、丢弃单字符 token
fn tokenize_to_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|s| s.to_lowercase())
        .filter(|s| s.len() > 1)
        .collect()
}

/// Jaccard 相似度，值域 [0,1]
fn jaccard_similarity(set1: &HashSet<String>, set2: &HashSet<String>) -> f32 {
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }
    let intersection = set1.intersection(set2).count() as f32;
    let union = set1.union(set2).count() as f32;
    intersection / union
}
