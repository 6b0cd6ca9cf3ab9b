//! Configuration loader and path helpers.
//!
//! Uses Figment to merge the built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars. The resulting [`RagConfig`] is a
//! plain value handed to each component at construction.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub data_path: String,
    pub index_save_path: String,
    pub embedding_model_dir: Option<String>,
    pub llm_model_name: String,
    pub llm_base_url: String,
    pub llm_api_key_env: String,
    /// Chunks handed to generation per query.
    pub top_k: usize,
    /// Candidates requested from each retriever before fusion.
    pub retriever_k: usize,
    /// Multiple of `top_k` fused before a metadata filter is applied.
    pub over_fetch_factor: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_path: "data/cook".to_string(),
            index_save_path: "vector_index".to_string(),
            embedding_model_dir: None,
            llm_model_name: "kimi-k2-0711-preview".to_string(),
            llm_base_url: "https://api.moonshot.cn/v1".to_string(),
            llm_api_key_env: "MOONSHOT_API_KEY".to_string(),
            top_k: 3,
            retriever_k: 5,
            over_fetch_factor: 3,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

impl RagConfig {
    pub fn load() -> anyhow::Result<Self> {
        Config::load()?.rag()
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        Config::load_from(dir)?.rag()
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [("top_k", self.top_k), ("retriever_k", self.retriever_k), ("over_fetch_factor", self.over_fetch_factor)] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.data_path.trim().is_empty() {
            return Err(Error::InvalidConfig("data_path is empty".to_string()));
        }
        Ok(())
    }

    pub fn data_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.data_path) }

    pub fn index_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.index_save_path) }

    pub fn model_dir(&self, base: &Path) -> Option<PathBuf> {
        self.embedding_model_dir.as_deref().map(|p| resolve_with_base(base, p))
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(""))
    }

    /// Like [`Config::load`], reading the config files from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(RagConfig::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn rag(&self) -> anyhow::Result<RagConfig> {
        let config: RagConfig = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read configuration: {}", e))?;
        config.validate()?;
        Ok(config)
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
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
