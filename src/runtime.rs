//! 运行时模块
//!
//! 两个常驻任务：一个消费连接跟踪通知，一个消费被截获的数据包并执行
//! 数据包管线。两者共享同一张流表。任务只在等待事件源时挂起，
//! 事件本身同步处理；事件源关闭后任务退出。

use crate::error::{ClassifierError, Result};
use crate::filter::Filter;
use crate::lifecycle::LifecycleEvent;
use crate::pipeline::PacketVerdict;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 被截获的数据包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPacket {
    /// 队列中的包 ID
    pub id: u32,
    /// IP 报文
    pub data: Bytes,
    /// 当前附带的标记
    pub mark: u32,
}

/// 带包 ID 的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedVerdict {
    /// 队列中的包 ID
    pub id: u32,
    /// 裁决
    pub verdict: PacketVerdict,
}

/// 数据包事件源
#[async_trait]
pub trait PacketSource: Send {
    /// 等待下一个数据包，事件源关闭时返回 `None`
    async fn recv(&mut self) -> Option<QueuedPacket>;

    /// 回送裁决
    async fn send_verdict(&mut self, id: u32, verdict: PacketVerdict) -> Result<()>;
}

/// 连接跟踪事件源
#[async_trait]
pub trait LifecycleSource: Send {
    /// 等待下一条通知，事件源关闭时返回 `None`
    async fn recv(&mut self) -> Option<LifecycleEvent>;
}

#[async_trait]
impl LifecycleSource for mpsc::Receiver<LifecycleEvent> {
    async fn recv(&mut self) -> Option<LifecycleEvent> {
        mpsc::Receiver::recv(self).await
    }
}

/// 基于通道的数据包事件源
#[derive(Debug)]
pub struct ChannelPacketSource {
    packets: mpsc::Receiver<QueuedPacket>,
    verdicts: mpsc::Sender<QueuedVerdict>,
}

#[async_trait]
impl PacketSource for ChannelPacketSource {
    async fn recv(&mut self) -> Option<QueuedPacket> {
        self.packets.recv().await
    }

    async fn send_verdict(&mut self, id: u32, verdict: PacketVerdict) -> Result<()> {
        self.verdicts
            .send(QueuedVerdict { id, verdict })
            .await
            .map_err(|_| ClassifierError::internal_error("verdict channel closed"))
    }
}

/// 创建数据包通道，返回（包发送端，裁决接收端，事件源）
pub fn packet_channel(
    capacity: usize,
) -> (
    mpsc::Sender<QueuedPacket>,
    mpsc::Receiver<QueuedVerdict>,
    ChannelPacketSource,
) {
    let (packet_tx, packet_rx) = mpsc::channel(capacity);
    let (verdict_tx, verdict_rx) = mpsc::channel(capacity);
    let source = ChannelPacketSource {
        packets: packet_rx,
        verdicts: verdict_tx,
    };
    (packet_tx, verdict_rx, source)
}

/// 创建连接跟踪通知通道
pub fn lifecycle_channel(
    capacity: usize,
) -> (mpsc::Sender<LifecycleEvent>, mpsc::Receiver<LifecycleEvent>) {
    mpsc::channel(capacity)
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// 处理的数据包数
    pub packets_handled: u64,
    /// 处理的通知数
    pub events_handled: u64,
}

/// 正在运行的过滤器任务
#[derive(Debug)]
pub struct FilterRuntime {
    packets: JoinHandle<u64>,
    events: JoinHandle<u64>,
}

impl FilterRuntime {
    /// 等待两个任务结束
    pub async fn join(self) -> Result<RuntimeStats> {
        let packets_handled = self
            .packets
            .await
            .map_err(|e| ClassifierError::internal_error(format!("packet worker failed: {}", e)))?;
        let events_handled = self
            .events
            .await
            .map_err(|e| ClassifierError::internal_error(format!("lifecycle worker failed: {}", e)))?;

        Ok(RuntimeStats {
            packets_handled,
            events_handled,
        })
    }

    /// 立即终止两个任务
    pub fn abort(&self) {
        self.packets.abort();
        self.events.abort();
    }
}

impl Filter {
    /// 在当前 tokio 运行时上启动两个常驻任务
    pub fn spawn<P, L>(&self, packets: P, events: L) -> FilterRuntime
    where
        P: PacketSource + 'static,
        L: LifecycleSource + 'static,
    {
        let lifecycle = self.clone();
        let events = tokio::spawn(run_lifecycle(lifecycle, events));
        let packets = tokio::spawn(run_packets(self.clone(), packets));

        FilterRuntime { packets, events }
    }
}

async fn run_lifecycle<L: LifecycleSource>(filter: Filter, mut source: L) -> u64 {
    let mut handled = 0;
    while let Some(event) = source.recv().await {
        filter.handle_event(&event);
        handled += 1;
    }
    tracing::debug!(events = handled, "lifecycle source closed");
    handled
}

async fn run_packets<P: PacketSource>(filter: Filter, mut source: P) -> u64 {
    let mut handled = 0;
    while let Some(packet) = source.recv().await {
        let verdict = filter.handle_packet(&packet.data, packet.mark);
        handled += 1;

        if let Err(e) = source.send_verdict(packet.id, verdict).await {
            tracing::error!(error = %e, id = packet.id, "failed to send verdict");
            break;
        }
    }
    tracing::debug!(packets = handled, "packet source closed");
    handled
}
