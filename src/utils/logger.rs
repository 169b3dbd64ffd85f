//! 日志模块
//!
//! 基于 `tracing` / `tracing-subscriber`，提供统一的日志配置和初始化。
//! 库内部只使用 `tracing` 宏输出诊断，是否安装订阅者由调用者决定。

use crate::error::{ClassifierError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 是否启用日志
    pub enabled: bool,
    /// 日志级别
    pub level: LogLevel,
    /// 是否显示时间戳
    pub show_timestamp: bool,
    /// 是否显示模块路径
    pub show_module: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用彩色输出
    pub use_colors: bool,
    /// 输出目标
    pub target: LogTarget,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// 错误
    Error,
    /// 警告
    Warn,
    /// 信息
    Info,
    /// 调试
    Debug,
    /// 跟踪
    Trace,
}

impl LogLevel {
    /// 由守护进程风格的详细度换算日志级别
    ///
    /// 负数（静默）只保留告警，0 为常规信息，1~2 为调试，3 及以上为跟踪。
    pub fn from_verbosity(verbosity: i32) -> Self {
        match verbosity {
            v if v < 0 => Self::Warn,
            0 => Self::Info,
            1 | 2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// 用于 `EnvFilter` 的指令字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// 标准输出
    Stdout,
    /// 标准错误
    Stderr,
    /// 文件（追加写入）
    File(String),
    /// 无输出（禁用）
    None,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            show_timestamp: true,
            show_module: true,
            show_line_number: false,
            use_colors: true,
            target: LogTarget::Stderr,
        }
    }
}

impl LoggerConfig {
    /// 检查是否启用了指定级别的日志
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.enabled && self.target != LogTarget::None && level <= self.level
    }
}

/// 安装全局日志订阅者
///
/// `RUST_LOG` 环境变量优先于配置中的级别。已经安装过订阅者时直接返回成功。
pub fn init_logger(config: LoggerConfig) -> Result<()> {
    if !config.enabled || config.target == LogTarget::None {
        return Ok(());
    }

    let writer = match &config.target {
        LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        LogTarget::None => return Ok(()),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(config.show_module)
        .with_line_number(config.show_line_number)
        .with_ansi(config.use_colors);
    let layer = if config.show_timestamp {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .map_err(|e| ClassifierError::config_error(format!("invalid log filter: {}", e)))?;

    if tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global logger already installed");
    }

    Ok(())
}

/// 构建器模式的日志配置
#[derive(Debug)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的配置构建器
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    /// 设置是否启用日志
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 设置日志级别
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// 按详细度设置日志级别
    pub fn verbosity(mut self, verbosity: i32) -> Self {
        self.config.level = LogLevel::from_verbosity(verbosity);
        self
    }

    /// 设置是否显示时间戳
    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.config.show_timestamp = show;
        self
    }

    /// 设置是否显示模块路径
    pub fn show_module(mut self, show: bool) -> Self {
        self.config.show_module = show;
        self
    }

    /// 设置是否显示行号
    pub fn show_line_number(mut self, show: bool) -> Self {
        self.config.show_line_number = show;
        self
    }

    /// 设置是否使用彩色输出
    pub fn use_colors(mut self, use_colors: bool) -> Self {
        self.config.use_colors = use_colors;
        self
    }

    /// 设置输出目标
    pub fn target(mut self, target: LogTarget) -> Self {
        self.config.target = target;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }

    /// 构建并初始化日志器
    pub fn init(self) -> Result<()> {
        init_logger(self.config)
    }
}

impl Default for LoggerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 创建禁用日志的配置
pub fn disabled_config() -> LoggerConfig {
    LoggerConfig {
        enabled: false,
        ..Default::default()
    }
}

/// 创建守护进程的日志配置
pub fn daemon_config(verbosity: i32) -> LoggerConfig {
    LoggerConfigBuilder::new()
        .verbosity(verbosity)
        .show_module(false)
        .use_colors(false)
        .build()
}

/// 创建文件日志配置
pub fn file_config<P: Into<String>>(path: P) -> LoggerConfig {
    LoggerConfigBuilder::new()
        .show_line_number(true)
        .use_colors(false)
        .target(LogTarget::File(path.into()))
        .build()
}
