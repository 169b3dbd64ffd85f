//! # L7-Detector: 应用层流分类器
//!
//! 把一条网络流累积的载荷与按协议编写的扩展正则特征逐一比对，
//! 得到协议标记，并写入数据包的 netfilter mark 供下游流控/防火墙使用。
//!
//! ## 组成
//!
//! - **特征仓库**: 读取协议映射配置和特征文件，编译成有序的特征列表
//! - **分类引擎**: 首个匹配优先，按加载顺序逐一尝试
//! - **流表**: 以流键索引的并发映射，每条流自带锁
//! - **数据包管线**: 解析报文头、查找流、分类并写回标记位域
//! - **生命周期处理**: 响应连接跟踪的创建/销毁通知
//!
//! ## 快速开始
//!
//! 用 [`FilterBuilder`] 加载配置得到 [`Filter`]，然后把连接跟踪通知交给
//! [`Filter::handle_event`]，把数据包交给 [`Filter::handle_packet`]；
//! 启用 `runtime-tokio` 特性时也可以用 `Filter::spawn` 启动常驻任务。

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

// 核心模块
pub mod core;
pub mod error;

// 工具模块
pub mod utils;

// 功能模块
pub mod lifecycle;
pub mod packet;
pub mod pipeline;
pub mod stream;

// 配置与组装
pub mod builder;
pub mod config;
pub mod filter;

#[cfg(feature = "runtime-tokio")]
pub mod runtime;

// 重新导出核心类型
pub use crate::core::{Classifier, FlowMark, Mark, Pattern, PatternRepository};
pub use crate::packet::{FlowKey, MarkWindow, TransportProtocol};
pub use crate::stream::{Flow, FlowTable};

pub use crate::builder::FilterBuilder;
pub use crate::config::FilterConfig;
pub use crate::error::{ClassifierError, Result};
pub use crate::filter::Filter;
pub use crate::lifecycle::{EventKind, FlowLifecycleHandler, LifecycleEvent};
pub use crate::pipeline::{PacketOutcome, PacketPipeline, PacketVerdict};

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 库描述
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
