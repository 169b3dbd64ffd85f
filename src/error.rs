//! 错误处理模块
//!
//! 定义L7探测器中使用的所有错误类型。
//!
//! 错误分为三类：
//! - 启动配置错误（致命）：配置文件不可读、特征文件缺失、编译失败等；
//! - 运行时告警：只记录日志，不会以错误形式返回；
//! - 防御性拒绝：数据包头部越界或传输层协议不受支持，数据包原样放行。

use std::path::PathBuf;
use thiserror::Error;

/// L7探测器的结果类型
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// 探测器错误类型
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// 协议映射配置文件不可读
    #[error("Could not read configuration from {path}: {source}")]
    ConfigUnreadable {
        /// 配置文件路径
        path: PathBuf,
        /// 底层I/O错误
        #[source]
        source: std::io::Error,
    },

    /// 没有任何规则加载成功
    #[error("No valid rules loaded")]
    NoValidRules,

    /// 找不到协议的特征定义文件
    #[error("Couldn't find a pattern definition file for {protocol} under {root}")]
    SignatureNotFound {
        /// 协议名称
        protocol: String,
        /// 搜索的根目录
        root: PathBuf,
    },

    /// 特征文件声明的协议名与期望不符
    #[error("Pattern file {path} declares protocol '{found}', expected '{expected}'")]
    ProtocolMismatch {
        /// 特征文件路径
        path: PathBuf,
        /// 期望的协议名
        expected: String,
        /// 文件中声明的协议名
        found: String,
    },

    /// 未知的标志位
    #[error("Unknown flag '{token}' in {path}")]
    UnknownFlag {
        /// 特征文件路径
        path: PathBuf,
        /// 无法识别的标志
        token: String,
    },

    /// 特征文件中没有正则表达式
    #[error("No pattern found in {path}")]
    MissingPattern {
        /// 特征文件路径
        path: PathBuf,
    },

    /// 正则表达式编译失败
    #[error("Error compiling {protocol}: {reason}")]
    PatternCompile {
        /// 协议名称
        protocol: String,
        /// 失败原因
        reason: String,
    },

    /// 配置错误
    #[error("Configuration error: {message}")]
    ConfigError {
        /// 错误消息
        message: String,
    },

    /// I/O错误
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// 数据包头部字段会导致越界读取
    #[error("Malformed packet: {reason}")]
    MalformedPacket {
        /// 失败原因
        reason: String,
    },

    /// 不支持的传输层协议
    #[error("Unsupported transport protocol: {0}")]
    UnsupportedTransport(u8),

    /// 内部错误
    #[error("Internal error: {message}")]
    InternalError {
        /// 错误消息
        message: String,
    },
}

impl ClassifierError {
    /// 创建配置错误
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 创建编译错误
    pub fn pattern_compile<S1, S2>(protocol: S1, reason: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::PatternCompile {
            protocol: protocol.into(),
            reason: reason.into(),
        }
    }

    /// 创建畸形数据包错误
    pub fn malformed_packet<S: Into<String>>(reason: S) -> Self {
        Self::MalformedPacket {
            reason: reason.into(),
        }
    }

    /// 创建内部错误
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// 是否为启动阶段的致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigUnreadable { .. }
                | Self::NoValidRules
                | Self::SignatureNotFound { .. }
                | Self::ProtocolMismatch { .. }
                | Self::UnknownFlag { .. }
                | Self::MissingPattern { .. }
                | Self::PatternCompile { .. }
                | Self::ConfigError { .. }
        )
    }

    /// 检查是否为配置相关错误
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigUnreadable { .. } | Self::NoValidRules | Self::ConfigError { .. }
        )
    }

    /// 检查是否为可恢复错误（数据包被原样放行）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedPacket { .. } | Self::UnsupportedTransport(_)
        )
    }

    /// 获取错误代码
    pub fn error_code(&self) -> u32 {
        match self {
            Self::ConfigUnreadable { .. } => 1001,
            Self::NoValidRules => 1002,
            Self::SignatureNotFound { .. } => 1003,
            Self::ProtocolMismatch { .. } => 1004,
            Self::UnknownFlag { .. } => 1005,
            Self::MissingPattern { .. } => 1006,
            Self::PatternCompile { .. } => 1007,
            Self::ConfigError { .. } => 1008,
            Self::IoError(_) => 1009,
            Self::MalformedPacket { .. } => 2001,
            Self::UnsupportedTransport(_) => 2002,
            Self::InternalError { .. } => 1999,
        }
    }
}

/// 从serde_json::Error转换
impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::config_error(format!("JSON error: {}", err))
    }
}
