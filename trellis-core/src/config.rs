//! 容器配置
//!
//! 启动期一次性读入的 TOML 配置：应用名、自拦截开关、拦截器/装饰器的
//! 启用顺序表，以及日志设置。配置冻结后不可再修改。

use std::path::Path;

use serde::Deserialize;

use crate::error::{ContainerError, ContainerResult};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};

/// 容器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 应用名（诊断输出用）
    pub application_name: String,

    /// 是否启用 Bean 自身声明的 around-invoke 自拦截
    pub self_interception_enabled: bool,

    /// 拦截器启用顺序（名称列表，先出现者在链上更外层）
    pub enabled_interceptors: Vec<String>,

    /// 装饰器启用顺序（名称列表，先出现者最先执行）
    pub enabled_decorators: Vec<String>,

    /// 日志设置
    pub logging: LoggingSection,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            application_name: "trellis".to_string(),
            self_interception_enabled: true,
            enabled_interceptors: Vec::new(),
            enabled_decorators: Vec::new(),
            logging: LoggingSection::default(),
        }
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        toml::from_str(content)
            .map_err(|e| ContainerError::Configuration(format!("invalid config: {}", e)))
    }

    /// 从 TOML 文件读取配置
    pub fn from_toml_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContainerError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}

/// `[logging]` 配置段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
    pub show_target: bool,
    pub filter: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            show_target: false,
            filter: None,
        }
    }
}

impl LoggingSection {
    /// 转换为可初始化的日志配置
    pub fn to_logging_config(&self) -> ContainerResult<LoggingConfig> {
        let level: LogLevel = self
            .level
            .parse()
            .map_err(ContainerError::Configuration)?;
        let format: LogFormat = self
            .format
            .parse()
            .map_err(ContainerError::Configuration)?;
        let mut config = LoggingConfig::new()
            .level(level)
            .format(format)
            .show_target(self.show_target);
        if let Some(filter) = &self.filter {
            config = config.filter(filter.clone());
        }
        Ok(config)
    }
}
