use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ranking: RankingConfig,
    pub profile: ProfileConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub retrainer: RetrainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub candidate_pool_size: usize,
    pub default_feed_limit: usize,
    pub default_trending_limit: usize,
    pub scoring_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub interaction_window: usize,
    pub order_window: usize,
    pub cache_ttl_seconds: u64,
    pub single_flight: bool,
    pub cuisine_vocabulary: Vec<String>,
    pub dietary_vocabulary: Vec<String>,
    pub default_spice_level: u8,
}

impl ProfileConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl EmbeddingConfig {
    /// The embedding path is only attempted with a credential configured.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainerConfig {
    pub scan_limit: usize,
    pub learning_rate: f64,
    pub interval_seconds: u64,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ranking: RankingConfig {
                candidate_pool_size: 100,
                default_feed_limit: 20,
                default_trending_limit: 10,
                scoring_concurrency: num_cpus::get() * 4,
            },
            profile: ProfileConfig {
                interaction_window: 1000,
                order_window: 100,
                cache_ttl_seconds: 300,
                single_flight: true,
                cuisine_vocabulary: strings(&[
                    "indian", "italian", "chinese", "mexican", "japanese", "thai",
                    "korean", "french", "mediterranean", "american", "vietnamese",
                    "greek", "spanish", "middle eastern", "ethiopian", "caribbean",
                ]),
                dietary_vocabulary: strings(&[
                    "vegan", "vegetarian", "gluten-free", "dairy-free", "halal",
                    "kosher", "keto", "paleo", "nut-free", "pescatarian",
                ]),
                default_spice_level: 2,
            },
            embedding: EmbeddingConfig {
                enabled: true,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "text-embedding-3-small".to_string(),
                timeout_ms: 2000,
            },
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                redis_url: "redis://localhost:6379".to_string(),
                key_prefix: "feedrank:profile".to_string(),
            },
            retrainer: RetrainerConfig {
                scan_limit: 10_000,
                learning_rate: 0.01,
                interval_seconds: 3600,
            },
        }
    }
}

impl Config {
    /// Layers a config file and `FEEDRANK__SECTION__KEY` variables over the defaults.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let settings = Self::builder()?.add_source(Self::environment()).build()?;

        Ok(settings.try_deserialize()?)
    }

    fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = serde_json::to_string(&Config::default())?;
        Ok(config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Json)))
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::EngineError;

        if self.ranking.candidate_pool_size == 0 {
            return Err(EngineError::Config(
                "ranking.candidate_pool_size must be positive".to_string(),
            ));
        }
        if self.profile.interaction_window == 0 {
            return Err(EngineError::Config(
                "profile.interaction_window must be positive".to_string(),
            ));
        }
        if !self.retrainer.learning_rate.is_finite() || self.retrainer.learning_rate < 0.0 {
            return Err(EngineError::Config(format!(
                "retrainer.learning_rate must be a non-negative number, got {}",
                self.retrainer.learning_rate
            )));
        }
        if self.embedding.is_usable() && self.embedding.timeout_ms == 0 {
            return Err(EngineError::Config("embedding.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// File if it exists, otherwise defaults plus environment.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!("Config file {} not found, using defaults", path);
            Self::from_env()
        }
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("FEEDRANK")
            .separator("__")
            .try_parsing(true)
    }
}
