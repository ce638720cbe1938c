use crate::calc::PricingPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pricing: PricingPolicy,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    /// 启动时在空库中写入演示数据
    pub seed_sample_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: "postgres://localhost/discount_offers".to_string(),
                max_connections: 20,
                seed_sample_data: false,
            },
            pricing: PricingPolicy::default(),
            upload: UploadConfig {
                max_bytes: 10 * 1024 * 1024,
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 < config.toml < APP__* 环境变量 < DATABASE_URL/SERVER_HOST/SERVER_PORT
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Some("config"), |key| std::env::var(key).ok())
    }

    /// `file` 为不带扩展名的配置文件路径, `env` 用于读取兼容的旧环境变量
    pub fn load_with(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env("DATABASE_URL"))?
            .set_override_option("server.host", env("SERVER_HOST"))?
            .set_override_option("server.port", env("SERVER_PORT"))?;

        builder.build()?.try_deserialize()
    }
}
