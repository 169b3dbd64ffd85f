//! 数据包管线
//!
//! 对每个被截获的数据包给出裁决标记。判定顺序：
//!
//! 1. 入站标记窗口内已有非哨兵值（且未开启 clobber）时直接放行；
//! 2. 非 TCP/UDP 或头部越界的报文原样放行；
//! 3. 按正向键、再按反向键查找流记录，找不到时返回 `Pending`，
//!    不在这里创建记录；
//! 4. 交给流记录观察载荷并分类；
//! 5. 把结果写入标记窗口。

use crate::core::classifier::Classifier;
use crate::core::mark::FlowMark;
use crate::error::ClassifierError;
use crate::packet::header;
use crate::packet::window::MarkWindow;
use crate::stream::flow::{Observation, DEFAULT_MAX_PACKETS};
use crate::stream::table::FlowTable;
use std::sync::Arc;

/// 裁决原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketOutcome {
    /// 入站标记已有分类结果，跳过分类
    AlreadyMarked,
    /// 不支持或畸形的报文，原样放行
    PassThrough,
    /// 流尚未被跟踪
    Untracked,
    /// 没有载荷
    NoPayload,
    /// 复用流的终态结果
    Cached,
    /// 本包完成分类
    Classified,
    /// 仍未匹配
    Pending,
    /// 预算耗尽
    GaveUp,
}

/// 数据包裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketVerdict {
    /// 最终写回的 32 位标记
    pub mark: u32,
    /// 裁决原因
    pub outcome: PacketOutcome,
}

impl PacketVerdict {
    fn unchanged(mark: u32, outcome: PacketOutcome) -> Self {
        Self { mark, outcome }
    }
}

/// 数据包管线
#[derive(Debug, Clone)]
pub struct PacketPipeline {
    classifier: Arc<Classifier>,
    table: Arc<FlowTable>,
    window: MarkWindow,
    max_packets: u32,
}

impl PacketPipeline {
    /// 创建管线
    pub fn new(
        classifier: Arc<Classifier>,
        table: Arc<FlowTable>,
        window: MarkWindow,
        max_packets: u32,
    ) -> Self {
        Self {
            classifier,
            table,
            window,
            max_packets,
        }
    }

    /// 使用默认窗口和包数预算创建管线
    pub fn with_defaults(classifier: Arc<Classifier>, table: Arc<FlowTable>) -> Self {
        Self::new(classifier, table, MarkWindow::default(), DEFAULT_MAX_PACKETS)
    }

    /// 标记窗口
    pub fn window(&self) -> MarkWindow {
        self.window
    }

    /// 每流包数预算
    pub fn max_packets(&self) -> u32 {
        self.max_packets
    }

    /// 处理一个数据包
    pub fn handle(&self, packet: &[u8], incoming: u32) -> PacketVerdict {
        if self.window.should_bypass(incoming) {
            tracing::trace!(mark = incoming, "packet already marked, skipping classification");
            return PacketVerdict::unchanged(incoming, PacketOutcome::AlreadyMarked);
        }

        let parsed = match header::parse(packet) {
            Ok(parsed) => parsed,
            Err(ClassifierError::UnsupportedTransport(number)) => {
                tracing::warn!(
                    protocol = number,
                    "only TCP and UDP are classified, passing packet through"
                );
                return PacketVerdict::unchanged(incoming, PacketOutcome::PassThrough);
            }
            Err(e) => {
                tracing::debug!(error = %e, "passing packet through unclassified");
                return PacketVerdict::unchanged(incoming, PacketOutcome::PassThrough);
            }
        };

        let flow = match self.table.lookup(&parsed.key) {
            Some(flow) => flow,
            None => {
                tracing::trace!(flow = %parsed.key, "no record for flow yet");
                return self.verdict(incoming, FlowMark::Pending, PacketOutcome::Untracked);
            }
        };

        let observation = flow.observe(parsed.payload, &self.classifier, self.max_packets);
        let outcome = match observation {
            Observation::Cached(_) => PacketOutcome::Cached,
            Observation::NoPayload => PacketOutcome::NoPayload,
            Observation::Classified(_) => PacketOutcome::Classified,
            Observation::Pending => PacketOutcome::Pending,
            Observation::GaveUp => PacketOutcome::GaveUp,
        };

        self.verdict(incoming, observation.flow_mark(), outcome)
    }

    fn verdict(&self, incoming: u32, flow_mark: FlowMark, outcome: PacketOutcome) -> PacketVerdict {
        PacketVerdict {
            mark: self.window.splice(incoming, flow_mark),
            outcome,
        }
    }
}
