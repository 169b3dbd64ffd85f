//! 分类引擎
//!
//! 按加载顺序依次尝试每个特征，第一个匹配的特征决定结果。
//! 引擎本身不保存任何状态，结果缓存由流记录负责。

use crate::core::mark::FlowMark;
use crate::core::pattern::Pattern;
use crate::core::repository::PatternRepository;
use crate::error::Result;
use std::path::Path;

/// 对缓冲区执行首个匹配优先的分类
///
/// 全部不匹配时返回 [`FlowMark::Pending`]。
pub fn classify(patterns: &[Pattern], buffer: &[u8]) -> FlowMark {
    for pattern in patterns {
        tracing::trace!(protocol = %pattern.name(), "checking against");

        if pattern.matches(buffer) {
            tracing::debug!(
                protocol = %pattern.name(),
                mark = %pattern.mark(),
                "matched"
            );
            return FlowMark::Classified(pattern.mark());
        }
    }

    FlowMark::Pending
}

/// 分类器
///
/// 启动时创建一次，之后以 `Arc<Classifier>` 共享给数据包管线。
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<Pattern>,
}

impl Classifier {
    /// 用已编译的特征列表创建分类器
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// 从映射配置文件和特征目录加载
    pub fn load(config_file: &Path, pattern_dir: &Path) -> Result<Self> {
        let repository = PatternRepository::new(pattern_dir);
        Ok(Self::new(repository.load(config_file)?))
    }

    /// 对缓冲区进行分类
    pub fn classify(&self, buffer: &[u8]) -> FlowMark {
        classify(&self.patterns, buffer)
    }

    /// 获取全部特征（按优先级排序）
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// 特征数量
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 是否没有任何特征
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mark::Mark;
    use crate::core::pattern::{CompileFlags, ExecFlags};

    fn pattern(name: &str, re: &str, mark: u32) -> Pattern {
        Pattern::new(
            name,
            re.as_bytes(),
            CompileFlags::default(),
            ExecFlags::default(),
            Mark::new(mark).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let get = pattern("get", "GET ", 10);
        let any = pattern("any", ".*", 20);

        let classifier = Classifier::new(vec![get.clone(), any.clone()]);
        assert_eq!(
            classifier.classify(b"GET /x"),
            FlowMark::Classified(Mark::new(10).unwrap())
        );

        let swapped = Classifier::new(vec![any, get]);
        assert_eq!(
            swapped.classify(b"GET /x"),
            FlowMark::Classified(Mark::new(20).unwrap())
        );
    }

    #[test]
    fn test_no_match_is_pending() {
        let classifier = Classifier::new(vec![pattern("ssh", "^ssh-", 22)]);
        assert_eq!(classifier.classify(b"GET /"), FlowMark::Pending);
        assert_eq!(classify(&[], b"anything"), FlowMark::Pending);
    }
}
