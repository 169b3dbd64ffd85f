//! 流记录
//!
//! 每条流持有自己的锁，保护载荷缓冲区、计数器和缓存的分类状态。
//! 不同流之间互不竞争；同一条流上的追加、分类和释放互斥进行。

use crate::core::classifier::Classifier;
use crate::core::mark::{FlowMark, Mark};
use crate::packet::key::FlowKey;
use crate::stream::buffer::PayloadBuffer;
use crate::utils::printable::friendly_print;
use parking_lot::Mutex;

/// 默认每条流最多检查的载荷包数
pub const DEFAULT_MAX_PACKETS: u32 = 8;

/// 一次观察的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// 流已处于终态，直接复用缓存结果
    Cached(FlowMark),
    /// 数据包没有载荷，流尚未终结
    NoPayload,
    /// 本次匹配成功
    Classified(Mark),
    /// 本次仍未匹配
    Pending,
    /// 预算耗尽，放弃分类
    GaveUp,
}

impl Observation {
    /// 对应的流分类状态
    pub fn flow_mark(&self) -> FlowMark {
        match self {
            Self::Cached(mark) => *mark,
            Self::NoPayload | Self::Pending => FlowMark::Pending,
            Self::Classified(mark) => FlowMark::Classified(*mark),
            Self::GaveUp => FlowMark::Rejected,
        }
    }
}

/// 流状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSnapshot {
    /// 分类状态
    pub mark: FlowMark,
    /// 已见载荷包数
    pub packets_seen: u32,
    /// 匹配器调用次数
    pub attempts: u32,
    /// 缓冲字节数
    pub buffered: usize,
    /// 缓冲区是否已释放
    pub released: bool,
}

#[derive(Debug)]
struct FlowState {
    buffer: PayloadBuffer,
    packets_seen: u32,
    attempts: u32,
    mark: FlowMark,
}

/// 流记录
#[derive(Debug)]
pub struct Flow {
    key: FlowKey,
    state: Mutex<FlowState>,
}

impl Flow {
    /// 创建空的流记录
    pub fn new(key: FlowKey, buffer_size: usize) -> Self {
        Self {
            key,
            state: Mutex::new(FlowState {
                buffer: PayloadBuffer::new(buffer_size),
                packets_seen: 0,
                attempts: 0,
                mark: FlowMark::Untouched,
            }),
        }
    }

    /// 流键
    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    /// 当前分类状态
    pub fn mark(&self) -> FlowMark {
        self.state.lock().mark
    }

    /// 已见载荷包数
    pub fn packets_seen(&self) -> u32 {
        self.state.lock().packets_seen
    }

    /// 获取状态快照
    pub fn snapshot(&self) -> FlowSnapshot {
        let state = self.state.lock();
        FlowSnapshot {
            mark: state.mark,
            packets_seen: state.packets_seen,
            attempts: state.attempts,
            buffered: state.buffer.len(),
            released: state.buffer.is_released(),
        }
    }

    /// 当前缓冲内容的副本
    pub fn buffered_data(&self) -> Vec<u8> {
        self.state.lock().buffer.as_slice().to_vec()
    }

    /// 观察一个数据包的载荷
    ///
    /// 载荷包计数加一；终态直接返回缓存结果；预算内则追加载荷并对整个
    /// 缓冲区重新分类；超出预算则转为 `Rejected` 并释放缓冲区。
    pub fn observe(&self, payload: &[u8], classifier: &Classifier, max_packets: u32) -> Observation {
        let mut state = self.state.lock();

        if payload.is_empty() {
            return if state.mark.is_terminal() {
                Observation::Cached(state.mark)
            } else {
                Observation::NoPayload
            };
        }

        state.packets_seen = state.packets_seen.saturating_add(1);

        if state.mark.is_terminal() {
            return Observation::Cached(state.mark);
        }

        if state.packets_seen <= max_packets {
            state.buffer.append(payload);
            state.attempts += 1;

            match classifier.classify(state.buffer.as_slice()) {
                FlowMark::Classified(mark) => {
                    state.mark = FlowMark::Classified(mark);
                    state.buffer.release();
                    tracing::debug!(
                        flow = %self.key,
                        mark = %mark,
                        packets = state.packets_seen,
                        "classified flow"
                    );
                    Observation::Classified(mark)
                }
                _ => {
                    state.mark = FlowMark::Pending;
                    Observation::Pending
                }
            }
        } else {
            state.mark = FlowMark::Rejected;
            tracing::debug!(
                flow = %self.key,
                packets = max_packets,
                data = %friendly_print(state.buffer.as_slice()),
                "Gave up on {} after {} packets",
                self.key,
                max_packets
            );
            state.buffer.release();
            Observation::GaveUp
        }
    }

    /// 流结束时释放缓冲区，返回是否真正释放
    ///
    /// 仍未终结且缓冲过数据的流会输出一次放弃记录。
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();

        if !state.mark.is_terminal() && !state.buffer.is_empty() {
            tracing::debug!(
                flow = %self.key,
                packets = state.packets_seen,
                data = %friendly_print(state.buffer.as_slice()),
                "Gave up on {} at teardown",
                self.key
            );
        }

        state.buffer.release()
    }
}
