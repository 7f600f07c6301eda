//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_EMBEDDING__API_KEY`). Provides helpers
//! to expand `~` and `${VAR}` and to resolve relative paths against a known
//! base directory.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
    /// Relative paths in the settings are resolved against this directory.
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Config files from the current directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&env::current_dir()?)
    }

    /// `config.toml` and `config.<env>.toml` from `dir`, then `APP_*` variables.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, env_name, base_dir: Some(dir.to_path_buf()) })
    }

    /// Build from an explicit figment, e.g. an inline TOML string in tests.
    /// Paths are left as written.
    pub fn from_figment(figment: Figment, env_name: &str) -> Self {
        Self { figment, env_name: env_name.to_string(), base_dir: None }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(base) = &self.base_dir {
            settings.resolve_paths(base);
        }
        settings.validate()?;
        settings.validate_for_env(&self.env_name)?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub document: DocumentSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub keywords: KeywordSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Path without extension; `<base>.txt` is preferred over `<base>.pdf`.
    pub base_path: String,
    /// Prefer a GBK reading of valid UTF-8 that shows no letters besides ASCII.
    pub expect_han: bool,
    /// Leading characters inspected by the Han probe.
    pub probe_chars: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self { base_path: "data/employee-rules".to_string(), expect_han: true, probe_chars: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_size: 512, overlap: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub dimension: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            dimension: 1536,
            timeout_ms: 30_000,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// LanceDB directory.
    pub uri: String,
    pub collection: String,
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            uri: "data/indexes/lancedb".to_string(),
            collection: "employee_rules".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the retrieval fan-out does when one variant's query fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole retrieval on the first failed source.
    #[default]
    FailFast,
    /// Drop failed sources and fuse the rest.
    Degrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub rrf_k: u32,
    /// Each variant query requests `overfetch * top_k` candidates.
    pub overfetch: usize,
    pub failure_policy: FailurePolicy,
    pub timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            rrf_k: 60,
            overfetch: 2,
            failure_policy: FailurePolicy::FailFast,
            timeout_ms: 10_000,
        }
    }
}

impl RetrievalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Swappable keyword lexicon, theme -> words. `None` keeps the built-in one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexicon: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexicon_file: Option<String>,
}

impl Settings {
    /// Expand and anchor the filesystem paths at `base`. URIs with a scheme
    /// (`s3://...`) are left alone.
    pub fn resolve_paths(&mut self, base: &Path) {
        let anchor = |p: &str| resolve_with_base(base, p).to_string_lossy().into_owned();
        self.document.base_path = anchor(&self.document.base_path);
        if !self.store.uri.contains("://") {
            self.store.uri = anchor(&self.store.uri);
        }
        if let Some(file) = self.keywords.lexicon_file.as_mut() {
            *file = anchor(file);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if self.document.expect_han && self.document.probe_chars == 0 {
            return Err(Error::InvalidConfig("document.probe_chars must be > 0 when expect_han is set".into()));
        }
        if c.max_size == 0 {
            return Err(Error::InvalidConfig("chunking.max_size must be > 0".into()));
        }
        if c.overlap >= c.max_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.max_size ({})",
                c.overlap, c.max_size
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be > 0".into()));
        }
        if self.store.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("store.collection must not be empty".into()));
        }
        let r = &self.retrieval;
        if r.default_top_k == 0 || r.default_top_k > r.max_top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.default_top_k ({}) must be in 1..={}",
                r.default_top_k, r.max_top_k
            )));
        }
        if r.overfetch == 0 {
            return Err(Error::InvalidConfig("retrieval.overfetch must be >= 1".into()));
        }
        if self.embedding.timeout_ms == 0 || self.store.timeout_ms == 0 || r.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be > 0 ms".into()));
        }
        Ok(())
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        match env {
            "prod" | "production" => {
                if self.embedding.provider == EmbeddingProviderKind::Fake {
                    return Err(Error::InvalidConfig(
                        "the fake embedding provider is not allowed in production".into(),
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
