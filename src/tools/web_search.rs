//! Web 搜索工具
//!
//! 调用 Tavily 风格的搜索 API（POST JSON，api_key + query + max_results），
//! 返回至多 max_results 条带排名的结果文本。任何失败（无 Key、网络、解析）
//! 都降级为说明文本结果，不会让回合出错。

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use async_trait::async_trait;

use crate::config::WebSearchSection;
use crate::tools::registry::require_str_arg;
use crate::tools::{Tool, ToolError, ToolOutput};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// web_search 工具：端点、结果数与超时来自配置，API Key 从环境变量读取
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(cfg: &WebSearchSection) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_key: std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty()),
            max_results: cfg.max_results,
        }
    }

    async fn search(&self, query: &str) -> Result<String, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "search API key not configured".to_string())?;

        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "max_results": self.max_results,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| format!("parse response: {}", e))?;

        if parsed.results.is_empty() {
            return Ok("No web results found.".to_string());
        }

        let mut out = Vec::new();
        for (i, r) in parsed.results.iter().take(self.max_results).enumerate() {
            out.push(format!("Result {}: {}", i + 1, r.title));
            out.push(format!("URL: {}", r.url));
            out.push(r.content.clone());
            out.push("---".to_string());
        }
        Ok(out.join("\n"))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Args: {\"query\": \"the search query\"}."
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = require_str_arg(&args, "query")?;
        tracing::info!(query = %query, "web search");
        match self.search(&query).await {
            Ok(text) => Ok(ToolOutput::Text(text)),
            // 搜索失败不致命：转说明文本交给模型
            Err(reason) => Ok(ToolOutput::Text(format!("Web search failed: {}", reason))),
        }
    }
}
