//! 流生命周期处理
//!
//! 响应连接跟踪的创建/销毁通知：创建时插入空的流记录，销毁时移除并释放。

use crate::packet::key::{FlowKey, TransportProtocol};
use crate::stream::buffer::DEFAULT_BUFFER_SIZE;
use crate::stream::flow::Flow;
use crate::stream::table::FlowTable;
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;
use std::sync::Arc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// 新建连接
    New,
    /// 连接状态更新
    Update,
    /// 连接销毁
    Destroy,
}

/// 连接跟踪通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// 通知类型
    pub kind: EventKind,
    /// IP 协议号
    pub protocol: u8,
    /// 发起方端点
    pub src: SocketAddrV4,
    /// 响应方端点
    pub dst: SocketAddrV4,
}

impl LifecycleEvent {
    /// 创建通知
    pub fn new(kind: EventKind, protocol: u8, src: SocketAddrV4, dst: SocketAddrV4) -> Self {
        Self {
            kind,
            protocol,
            src,
            dst,
        }
    }

    /// 由流键创建通知
    pub fn for_key(kind: EventKind, key: &FlowKey) -> Self {
        Self::new(kind, key.protocol.number(), key.src, key.dst)
    }

    /// 流键，非 TCP/UDP 时为 `None`
    pub fn key(&self) -> Option<FlowKey> {
        TransportProtocol::from_number(self.protocol)
            .map(|protocol| FlowKey::new(protocol, self.src, self.dst))
    }
}

/// 流生命周期处理器
#[derive(Debug, Clone)]
pub struct FlowLifecycleHandler {
    table: Arc<FlowTable>,
    buffer_size: usize,
}

impl FlowLifecycleHandler {
    /// 创建处理器
    pub fn new(table: Arc<FlowTable>, buffer_size: usize) -> Self {
        Self { table, buffer_size }
    }

    /// 使用默认缓冲区大小创建处理器
    pub fn with_defaults(table: Arc<FlowTable>) -> Self {
        Self::new(table, DEFAULT_BUFFER_SIZE)
    }

    /// 处理一条通知
    pub fn handle(&self, event: &LifecycleEvent) {
        let key = match event.key() {
            Some(key) => key,
            None => {
                tracing::trace!(protocol = event.protocol, "ignoring non TCP/UDP notification");
                return;
            }
        };

        match event.kind {
            EventKind::New => self.on_new(key),
            EventKind::Destroy => self.on_destroy(&key),
            EventKind::Update => {
                tracing::trace!(flow = %key, "connection update");
            }
        }
    }

    /// 新建连接
    pub fn on_new(&self, key: FlowKey) {
        tracing::trace!(flow = %key, "got NEW notification");
        self.table.insert(Flow::new(key, self.buffer_size));
    }

    /// 连接销毁
    pub fn on_destroy(&self, key: &FlowKey) {
        if self.table.remove(key).is_some() {
            tracing::trace!(flow = %key, "removed flow on DESTROY");
        } else {
            tracing::trace!(flow = %key, "DESTROY for untracked flow");
        }
    }
}
