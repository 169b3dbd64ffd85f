//! 流表
//!
//! 以流键索引的并发映射。一把读写锁串行化结构性操作，
//! 每条流的内容由流自身的锁保护。

use crate::packet::key::FlowKey;
use crate::stream::flow::Flow;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 流表
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: RwLock<HashMap<FlowKey, Arc<Flow>>>,
}

impl FlowTable {
    /// 创建空流表
    pub fn new() -> Self {
        Self::default()
    }

    /// 查找流，不存在不是错误
    pub fn get(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        self.flows.read().get(key).cloned()
    }

    /// 先按正向键、再按反向键查找
    pub fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        let flows = self.flows.read();
        flows
            .get(key)
            .or_else(|| flows.get(&key.reversed()))
            .cloned()
    }

    /// 插入流记录，同键的旧记录先被驱逐并释放
    ///
    /// 返回被驱逐的旧记录。
    pub fn insert(&self, flow: Flow) -> Option<Arc<Flow>> {
        let key = *flow.key();
        let evicted = self.flows.write().insert(key, Arc::new(flow));

        if let Some(old) = &evicted {
            tracing::warn!(
                flow = %key,
                packets = old.packets_seen(),
                "NEW with existing connection {}, replacing the stale record",
                key
            );
            old.close();
        }

        evicted
    }

    /// 移除并释放流记录，键不存在时什么也不做
    pub fn remove(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        let removed = self.flows.write().remove(key);
        if let Some(flow) = &removed {
            flow.close();
        }
        removed
    }

    /// 是否包含键
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.read().contains_key(key)
    }

    /// 流数量
    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.flows.read().is_empty()
    }

    /// 全部流键
    pub fn keys(&self) -> Vec<FlowKey> {
        self.flows.read().keys().copied().collect()
    }
}
