//! 流状态模块
//!
//! 载荷缓冲区、流记录和并发流表。

pub mod buffer;
pub mod flow;
pub mod table;

pub use buffer::{BufferStats, PayloadBuffer};
pub use flow::{Flow, FlowSnapshot, Observation};
pub use table::FlowTable;
