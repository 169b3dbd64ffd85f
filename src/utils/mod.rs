//! 工具模块

pub mod logger;
pub mod printable;

pub use logger::{init_logger, LogLevel, LogTarget, LoggerConfig, LoggerConfigBuilder};
pub use printable::friendly_print;
