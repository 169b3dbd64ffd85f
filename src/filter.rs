//! 过滤器
//!
//! 持有共享的分类器、流表、数据包管线和生命周期处理器，
//! 各组件通过 `Arc` 注入，不依赖全局状态。

use crate::config::FilterConfig;
use crate::core::classifier::Classifier;
use crate::error::Result;
use crate::lifecycle::{FlowLifecycleHandler, LifecycleEvent};
use crate::pipeline::{PacketPipeline, PacketVerdict};
use crate::stream::table::FlowTable;
use std::sync::Arc;

/// 组装完成的过滤器
#[derive(Debug, Clone)]
pub struct Filter {
    config: FilterConfig,
    classifier: Arc<Classifier>,
    table: Arc<FlowTable>,
    pipeline: Arc<PacketPipeline>,
    lifecycle: Arc<FlowLifecycleHandler>,
}

impl Filter {
    /// 由配置和分类器组装过滤器
    pub fn new(config: FilterConfig, classifier: Classifier) -> Result<Self> {
        let window = config.mark_window()?;
        let classifier = Arc::new(classifier);
        let table = Arc::new(FlowTable::new());

        let pipeline = Arc::new(PacketPipeline::new(
            Arc::clone(&classifier),
            Arc::clone(&table),
            window,
            config.max_packets,
        ));
        let lifecycle = Arc::new(FlowLifecycleHandler::new(
            Arc::clone(&table),
            config.buffer_size,
        ));

        Ok(Self {
            config,
            classifier,
            table,
            pipeline,
            lifecycle,
        })
    }

    /// 处理一个数据包
    pub fn handle_packet(&self, packet: &[u8], mark: u32) -> PacketVerdict {
        self.pipeline.handle(packet, mark)
    }

    /// 处理一条连接跟踪通知
    pub fn handle_event(&self, event: &LifecycleEvent) {
        self.lifecycle.handle(event)
    }

    /// 配置
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// 分类器
    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// 流表
    pub fn table(&self) -> &Arc<FlowTable> {
        &self.table
    }

    /// 数据包管线
    pub fn pipeline(&self) -> &Arc<PacketPipeline> {
        &self.pipeline
    }

    /// 生命周期处理器
    pub fn lifecycle(&self) -> &Arc<FlowLifecycleHandler> {
        &self.lifecycle
    }
}
