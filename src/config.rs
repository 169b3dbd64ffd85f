//! 过滤器配置
//!
//! 可以从 JSON 加载，未给出的字段取默认值。

use crate::core::repository::DEFAULT_PATTERN_DIR;
use crate::error::{ClassifierError, Result};
use crate::packet::window::MarkWindow;
use crate::stream::buffer::DEFAULT_BUFFER_SIZE;
use crate::stream::flow::DEFAULT_MAX_PACKETS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认的协议映射配置文件
pub const DEFAULT_CONFIG_FILE: &str = "l7-filter.conf";

/// 缓冲区大小的建议上限
pub const MAX_BUFFER_SIZE: usize = 65535;

/// 每流检查包数的建议范围
pub const MIN_ADVISED_PACKETS: u32 = 3;
/// 每流检查包数的建议上限
pub const MAX_ADVISED_PACKETS: u32 = 16;

/// 过滤器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 协议映射配置文件
    pub config_file: PathBuf,
    /// 特征目录
    pub pattern_dir: PathBuf,
    /// 每流缓冲区字节数
    pub buffer_size: usize,
    /// 每流最多检查的载荷包数
    pub max_packets: u32,
    /// 分类结果占用的标记位域
    pub mark_mask: u32,
    /// 是否覆盖整个标记字段
    pub clobber_mark: bool,
    /// 允许超出建议范围的取值
    pub allow_ill_advised: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            pattern_dir: PathBuf::from(DEFAULT_PATTERN_DIR),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_packets: DEFAULT_MAX_PACKETS,
            mark_mask: u32::MAX,
            clobber_mark: false,
            allow_ill_advised: false,
        }
    }
}

impl FilterConfig {
    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从 JSON 文件加载
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 校验取值
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ClassifierError::config_error("buffer_size must be positive"));
        }
        if self.buffer_size > MAX_BUFFER_SIZE && !self.allow_ill_advised {
            return Err(ClassifierError::config_error(format!(
                "buffer_size {} is out of range 1-{} (set allow_ill_advised to override)",
                self.buffer_size, MAX_BUFFER_SIZE
            )));
        }

        if self.max_packets == 0 {
            return Err(ClassifierError::config_error("max_packets must be positive"));
        }
        if !(MIN_ADVISED_PACKETS..=MAX_ADVISED_PACKETS).contains(&self.max_packets)
            && !self.allow_ill_advised
        {
            return Err(ClassifierError::config_error(format!(
                "max_packets {} is out of range {}-{} (set allow_ill_advised to override)",
                self.max_packets, MIN_ADVISED_PACKETS, MAX_ADVISED_PACKETS
            )));
        }

        self.mark_window().map(|_| ())
    }

    /// 由掩码和 clobber 设置构造标记窗口
    pub fn mark_window(&self) -> Result<MarkWindow> {
        MarkWindow::new(self.mark_mask, self.clobber_mark)
    }
}
