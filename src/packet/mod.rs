//! 数据包模块
//!
//! 报文头解析、流键推导以及标记位域的读写。

pub mod header;
pub mod key;
pub mod window;

pub use header::{parse, ParsedPacket, Transport};
pub use key::{FlowKey, TransportProtocol};
pub use window::MarkWindow;
