//! Configuração do adcrew carregada a partir de `adcrew.toml`.
//!
//! A struct [`AdcrewConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis `OPENAI_API_KEY`, `ADCREW_STORAGE_ROOT`, `ADCREW_PUBLIC_URL` e
//! `ADCREW_DATABASE` têm precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryPolicy;

const DEFAULT_CONFIG_FILE: &str = "adcrew.toml";

/// Configuração de nível superior carregada de `adcrew.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdcrewConfig {
    /// Máximo de usuários processados em paralelo.
    #[serde(default = "default_max_concurrent_users")]
    pub max_concurrent_users: usize,

    /// Timeout das requisições HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub openai: OpenAiSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub launcher: LauncherConfig,
}

/// Credenciais e modelos da API OpenAI.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Modelo usado pelo AdCreator.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Modelo usado pelo QAReviewer.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Modelo usado pelo Copywriter.
    #[serde(default = "default_text_model")]
    pub text_model: String,
}

/// Onde as imagens geradas são gravadas e como são expostas.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Banco SQLite das imagens geradas. Sem ele, o armazenamento fica em
    /// memória (ou no snapshot JSON passado em `--store`).
    #[serde(default)]
    pub database: Option<PathBuf>,
}

/// Endpoint do serviço que publica os anúncios.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_token: String,
}

fn default_max_concurrent_users() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("adcrew-assets")
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for AdcrewConfig {
    fn default() -> Self {
        Self {
            max_concurrent_users: default_max_concurrent_users(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            openai: OpenAiSettings::default(),
            storage: StorageConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            image_model: default_image_model(),
            vision_model: default_vision_model(),
            text_model: default_text_model(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            database: None,
        }
    }
}

impl AdcrewConfig {
    /// Carrega a configuração de `path`, ou de `adcrew.toml` no diretório atual.
    /// Usa valores padrão se o arquivo padrão não existir; um caminho
    /// explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<AdcrewConfig>(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Aplica as variáveis de ambiente sobre os valores do arquivo.
    /// Valores vazios são ignorados.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Some(root) = var("ADCREW_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(url) = var("ADCREW_PUBLIC_URL") {
            self.storage.public_base_url = url;
        }
        if let Some(database) = var("ADCREW_DATABASE") {
            self.storage.database = Some(PathBuf::from(database));
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
