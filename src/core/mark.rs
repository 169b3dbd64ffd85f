//! 标记定义模块
//!
//! 定义协议标记（Mark）以及流的分类状态。
//!
//! 流内部使用带标签的 [`FlowMark`] 表示分类状态，只有在数据包管线边界
//! 才转换为写入 netfilter mark 的整数编码。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 协议标记
///
/// 取值范围为 `1..=65534`，0 和更大的值保留给哨兵状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Mark(u16);

impl Mark {
    /// 最小合法标记
    pub const MIN: u32 = 1;
    /// 最大合法标记
    pub const MAX: u32 = 65534;

    /// 创建标记，超出范围时返回 `None`
    pub fn new(value: u32) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value as u16))
        } else {
            None
        }
    }

    /// 获取标记值
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Mark {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Mark::new(value).ok_or_else(|| {
            format!("mark {} is not in the range {}-{}", value, Mark::MIN, Mark::MAX)
        })
    }
}

impl From<Mark> for u32 {
    fn from(mark: Mark) -> Self {
        mark.value()
    }
}

/// 流的分类状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowMark {
    /// 尚未尝试分类
    #[default]
    Untouched,
    /// 已尝试分类但尚未匹配
    Pending,
    /// 数据包预算耗尽仍未匹配，放弃
    Rejected,
    /// 已识别的协议标记
    Classified(Mark),
}

impl FlowMark {
    /// `Untouched` 的编码
    pub const WIRE_UNTOUCHED: u32 = 0;
    /// `Pending` 的编码
    pub const WIRE_PENDING: u32 = 65535;
    /// `Rejected` 的编码
    pub const WIRE_REJECTED: u32 = 65536;

    /// 是否为终态（不再继续分类）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Classified(_))
    }

    /// 是否为哨兵值
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Classified(_))
    }

    /// 获取协议标记
    pub fn mark(&self) -> Option<Mark> {
        match self {
            Self::Classified(mark) => Some(*mark),
            _ => None,
        }
    }

    /// 转换为整数编码
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Untouched => Self::WIRE_UNTOUCHED,
            Self::Pending => Self::WIRE_PENDING,
            Self::Rejected => Self::WIRE_REJECTED,
            Self::Classified(mark) => mark.value(),
        }
    }

    /// 从整数编码解析，无法识别的值返回 `None`
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            Self::WIRE_UNTOUCHED => Some(Self::Untouched),
            Self::WIRE_PENDING => Some(Self::Pending),
            Self::WIRE_REJECTED => Some(Self::Rejected),
            other => Mark::new(other).map(Self::Classified),
        }
    }
}

impl fmt::Display for FlowMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untouched => write!(f, "untouched"),
            Self::Pending => write!(f, "pending"),
            Self::Rejected => write!(f, "rejected"),
            Self::Classified(mark) => write!(f, "mark={}", mark),
        }
    }
}

impl From<Mark> for FlowMark {
    fn from(mark: Mark) -> Self {
        Self::Classified(mark)
    }
}
