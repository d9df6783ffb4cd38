//! 外部工具目录
//!
//! 向 MCP 风格端点发 JSON-RPC `tools/list`，带调用方凭证（Bearer），
//! 将远端描述的工具列表汇总为文本。纯 best-effort：未配置端点或任何
//! 失败都降级为说明文本，核心回合不依赖它。

use reqwest::Client;
use serde_json::Value;

use async_trait::async_trait;

use crate::config::CatalogSection;
use crate::tools::registry::require_str_arg;
use crate::tools::{Tool, ToolError, ToolOutput};

/// tool_catalog 工具
pub struct ToolCatalogTool {
    client: Client,
    endpoint: Option<String>,
    auth_token: Option<String>,
}

impl ToolCatalogTool {
    pub fn new(cfg: &CatalogSection) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: cfg.endpoint.clone(),
            auth_token: std::env::var(&cfg.auth_token_env).ok().filter(|t| !t.is_empty()),
        }
    }

    async fn fetch_catalog(&self) -> Result<String, String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| "no catalog endpoint configured".to_string())?;

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list",
            "params": {},
        });
        let mut req = self.client.post(endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let value: Value = resp.json().await.map_err(|e| format!("parse response: {}", e))?;
        render_tool_list(&value)
    }
}

/// 从 JSON-RPC 响应中提取 result.tools 并渲染为 `- name: description` 列表
fn render_tool_list(value: &Value) -> Result<String, String> {
    if let Some(err) = value.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown JSON-RPC error");
        return Err(msg.to_string());
    }
    let tools = value
        .get("result")
        .and_then(|r| r.get("tools"))
        .and_then(|t| t.as_array())
        .ok_or_else(|| "no tools in response".to_string())?;

    if tools.is_empty() {
        return Ok("The external catalog lists no tools.".to_string());
    }

    let mut lines = vec![format!("External catalog tools ({}):", tools.len())];
    for t in tools {
        let name = t.get("name").and_then(|v| v.as_str()).unwrap_or("(unnamed)");
        let description = t
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        lines.push(format!("- {}: {}", name, description));
    }
    Ok(lines.join("\n"))
}

#[async_trait]
impl Tool for ToolCatalogTool {
    fn name(&self) -> &str {
        "tool_catalog"
    }

    fn description(&self) -> &str {
        "List tools described by the configured external tool catalog. Args: {\"query\": \"ignored filter text\"}."
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let _query = require_str_arg(&args, "query").unwrap_or_default();
        match self.fetch_catalog().await {
            Ok(text) => Ok(ToolOutput::Text(text)),
            Err(reason) => Ok(ToolOutput::Text(format!(
                "Tool catalog unavailable: {}",
                reason
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_endpoint_degrades_to_text() {
        let tool = ToolCatalogTool::new(&CatalogSection::default());
        let out = tool
            .execute(serde_json::json!({"query": "list"}))
            .await
            .unwrap();
        match out {
            ToolOutput::Text(text) => assert!(text.starts_with("Tool catalog unavailable: ")),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn renders_tool_list() {
        let value = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "tools": [
                    {"name": "create_issue", "description": "Create a GitHub issue"},
                    {"name": "search_code"}
                ]
            }
        });
        let text = render_tool_list(&value).unwrap();
        assert!(text.starts_with("External catalog tools (2):"));
        assert!(text.contains("- create_issue: Create a GitHub issue"));
        assert!(text.contains("- search_code: "));
    }

    #[test]
    fn json_rpc_error_is_reported() {
        let value = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "method not found"}
        });
        assert_eq!(render_tool_list(&value).unwrap_err(), "method not found");
    }
}
