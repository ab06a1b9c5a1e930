use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Remote service endpoint and polling behavior.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed interval between status polls (batch ingestion, runs).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    5
}
fn default_poll_interval_ms() -> u64 {
    1000
}

/// Local document corpus to ingest.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    /// Extension allow-list (lowercase, without dots).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            extensions: default_extensions(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./build/datas")
}

fn default_extensions() -> Vec<String> {
    [
        "txt", "pdf", "md", "doc", "docx", "html", "json", "py", "js", "java", "cpp", "cs", "go",
        "rb", "php", "css", "sh", "tex", "ts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Where the active index handle is persisted.
#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./build/index_handle.json")
}

/// Assistant persona used by the chat session.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            model: default_model(),
            instructions: default_instructions(),
        }
    }
}

fn default_index_name() -> String {
    "Document Store".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_instructions() -> String {
    "You answer questions based on the files provided in the vector store.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

/// Load and validate configuration. A missing file is not an error — every
/// setting has a default, so `vsctl` works out of the box against the
/// standard endpoint.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if config.service.base_url.is_empty() {
        anyhow::bail!("service.base_url must not be empty");
    }

    if config.service.poll_interval_ms == 0 {
        anyhow::bail!("service.poll_interval_ms must be > 0");
    }

    if config.corpus.extensions.is_empty() {
        anyhow::bail!("corpus.extensions must list at least one extension");
    }

    if config.search.top_k == 0 {
        anyhow::bail!("search.top_k must be >= 1");
    }

    Ok(config)
}
