//! 过滤器构造器模块
//!
//! 提供流畅的链式API来配置并组装过滤器。

use crate::config::FilterConfig;
use crate::core::classifier::Classifier;
use crate::core::pattern::Pattern;
use crate::core::repository::PatternRepository;
use crate::error::{ClassifierError, Result};
use crate::filter::Filter;
use std::path::PathBuf;

/// 过滤器构造器
///
/// 校验配置、加载特征仓库，并把分类器、流表、管线和生命周期处理器
/// 组装成一个 [`Filter`]。
///
/// # 示例
///
/// ```rust,no_run
/// use l7_detector::FilterBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let filter = FilterBuilder::new()
///     .with_config_file("/etc/l7-filter.conf")
///     .with_pattern_dir("/etc/l7-protocols")
///     .with_max_packets(10)
///     .with_mark_mask(0xFFFF_8000)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FilterBuilder {
    config: FilterConfig,
    patterns: Option<Vec<Pattern>>,
}

impl FilterBuilder {
    /// 创建新的构造器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有配置开始
    pub fn from_config(config: FilterConfig) -> Self {
        Self {
            config,
            patterns: None,
        }
    }

    /// 设置协议映射配置文件
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_file = path.into();
        self
    }

    /// 设置特征目录
    pub fn with_pattern_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pattern_dir = path.into();
        self
    }

    /// 设置每流缓冲区大小
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// 设置每流最多检查的载荷包数
    pub fn with_max_packets(mut self, packets: u32) -> Self {
        self.config.max_packets = packets;
        self
    }

    /// 设置标记位域
    pub fn with_mark_mask(mut self, mask: u32) -> Self {
        self.config.mark_mask = mask;
        self
    }

    /// 覆盖整个标记字段
    pub fn clobber_mark(mut self, clobber: bool) -> Self {
        self.config.clobber_mark = clobber;
        self
    }

    /// 允许超出建议范围的取值
    pub fn allow_ill_advised(mut self, allow: bool) -> Self {
        self.config.allow_ill_advised = allow;
        self
    }

    /// 直接使用已编译的特征，不再读取配置文件
    pub fn with_patterns(mut self, patterns: Vec<Pattern>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// 当前配置
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// 构建过滤器
    pub fn build(self) -> Result<Filter> {
        self.config.validate()?;

        let patterns = match self.patterns {
            Some(patterns) if patterns.is_empty() => return Err(ClassifierError::NoValidRules),
            Some(patterns) => patterns,
            None => PatternRepository::new(&self.config.pattern_dir).load(&self.config.config_file)?,
        };

        tracing::info!(rules = patterns.len(), "pattern repository loaded");
        Filter::new(self.config, Classifier::new(patterns))
    }
}
