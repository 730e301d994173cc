//! 引擎配置
//!
//! 分层读取 TOML 文件与 PREDICATE_ 环境变量，反序列化为强类型的配置结构。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 默认表达式最大嵌套深度
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 64;

/// 默认消息片段分隔符
pub const DEFAULT_MESSAGE_SEPARATOR: &str = " ";

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 表达式最大嵌套深度，超过时解析失败
    pub max_expression_depth: usize,
    /// 结果消息片段之间的分隔符
    pub message_separator: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
            message_separator: DEFAULT_MESSAGE_SEPARATOR.to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 日志级别（如 "info", "debug"），RUST_LOG 优先
    pub log_level: String,
    /// 是否启用 JSON 格式日志
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置，后面的来源覆盖前面的同名项：
    /// 1. {CONFIG_DIR}/default.toml
    /// 2. {CONFIG_DIR}/{PREDICATE_ENV}.toml，环境默认 development
    /// 3. {CONFIG_DIR}/{service_name}.toml
    /// 4. 环境变量（PREDICATE_ 前缀，`__` 分隔层级，
    ///    如 PREDICATE_ENGINE__MAX_EXPRESSION_DEPTH -> engine.max_expression_depth）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("PREDICATE_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let dir = Path::new(&config_dir);
        let files = [
            dir.join("default.toml"),
            dir.join(format!("{env}.toml")),
            dir.join(format!("{service_name}.toml")),
        ];

        let mut builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?;
        for file in files {
            builder = builder.add_source(File::from(file).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("PREDICATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
