//! 标记窗口
//!
//! 分类结果只占数据包标记中一段连续的位域，窗口外的位原样保留；
//! 开启 clobber 后整个标记字段都归本过滤器所有。

use crate::core::mark::FlowMark;
use crate::error::{ClassifierError, Result};

/// 窗口至少需要容纳的位数（能表示 0..=65536）
pub const MIN_WINDOW_BITS: u32 = 17;

/// 标记位域窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkWindow {
    mask: u32,
    shift: u32,
    clobber: bool,
}

impl MarkWindow {
    /// 创建窗口，掩码必须非零、连续且至少 17 位宽
    pub fn new(mask: u32, clobber: bool) -> Result<Self> {
        if mask == 0 {
            return Err(ClassifierError::config_error("mark mask must not be zero"));
        }

        let shift = mask.trailing_zeros();
        let normalized = u64::from(mask >> shift);
        if (normalized + 1) & normalized != 0 {
            return Err(ClassifierError::config_error(format!(
                "mark mask {:#010x} is not contiguous",
                mask
            )));
        }
        if mask.count_ones() < MIN_WINDOW_BITS {
            return Err(ClassifierError::config_error(format!(
                "mark mask {:#010x} is narrower than {} bits",
                mask, MIN_WINDOW_BITS
            )));
        }

        Ok(Self {
            mask,
            shift,
            clobber,
        })
    }

    /// 覆盖整个 32 位字段的窗口
    pub fn full() -> Self {
        Self {
            mask: u32::MAX,
            shift: 0,
            clobber: false,
        }
    }

    /// 掩码
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// 是否覆盖窗口外的位
    pub fn clobber(&self) -> bool {
        self.clobber
    }

    /// 取出窗口内的值
    pub fn extract(&self, mark: u32) -> u32 {
        (mark & self.mask) >> self.shift
    }

    /// 入站标记在窗口内已有非哨兵值且未开启 clobber 时跳过分类
    pub fn should_bypass(&self, incoming: u32) -> bool {
        if self.clobber {
            return false;
        }
        !matches!(
            self.extract(incoming),
            FlowMark::WIRE_UNTOUCHED | FlowMark::WIRE_PENDING | FlowMark::WIRE_REJECTED
        )
    }

    /// 把分类结果写入标记
    pub fn splice(&self, incoming: u32, verdict: FlowMark) -> u32 {
        let bits = (verdict.to_wire() << self.shift) & self.mask;
        if self.clobber {
            bits
        } else {
            (incoming & !self.mask) | bits
        }
    }
}

impl Default for MarkWindow {
    fn default() -> Self {
        Self::full()
    }
}
