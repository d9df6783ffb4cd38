//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FIESTA__*` 覆盖（双下划线表示嵌套，如 `FIESTA__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub turn: TurnSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub web: WebSection,
}

/// [app] 段：应用名、线程快照目录（设置后启用文件存储，否则纯内存）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 线程快照目录；未设置时线程状态仅保存在进程内存
    pub threads_dir: Option<PathBuf>,
}

/// [llm] 段：OpenAI 兼容端点与模型
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 嵌入模型；为空时检索退化为关键词匹配
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            embedding_model: default_embedding_model(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [turn] 段：单回合规划轮数上限（步数预算为 2*max_iterations+1）
#[derive(Debug, Clone, Deserialize)]
pub struct TurnSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for TurnSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    3
}

/// [tools] 段：工具超时与各工具配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub web_search: WebSearchSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub catalog: CatalogSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.web_search] 段：搜索 API 端点、结果数、超时；API Key 从环境变量读取
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_api_key_env(),
            max_results: default_search_max_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_max_results() -> usize {
    3
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// [tools.retrieval] 段：宾客数据文件与返回条数上限
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_retrieval_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_retrieval_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            data_file: default_retrieval_data_file(),
            top_k: default_retrieval_top_k(),
        }
    }
}

fn default_retrieval_data_file() -> PathBuf {
    PathBuf::from("data/invites.json")
}

fn default_retrieval_top_k() -> usize {
    5
}

/// [tools.catalog] 段：外部工具目录端点（MCP 风格 tools/list）；endpoint 为空时工具返回说明文本
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_catalog_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_token_env: default_catalog_token_env(),
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

fn default_catalog_token_env() -> String {
    "CATALOG_AUTH_TOKEN".to_string()
}

fn default_catalog_timeout_secs() -> u64 {
    10
}

/// [web] 段：HTTP API 监听端口
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: default_web_port(),
        }
    }
}

fn default_web_port() -> u16 {
    8000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            turn: TurnSection::default(),
            tools: ToolsSection::default(),
            web: WebSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 FIESTA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FIESTA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FIESTA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
