//! 流键模块
//!
//! 流键由传输层协议和两端的 `地址:端口` 组成。键本身带方向：
//! 连接跟踪通知里给出的是发起方方向，回程数据包算出的是反向键，
//! 管线先查正向键再查 [`FlowKey::reversed`]，同一条记录服务两个方向。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// 支持分类的传输层协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProtocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl TransportProtocol {
    /// TCP 的 IP 协议号
    pub const TCP_NUMBER: u8 = 6;
    /// UDP 的 IP 协议号
    pub const UDP_NUMBER: u8 = 17;

    /// 由 IP 协议号转换，不支持的协议返回 `None`
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            Self::TCP_NUMBER => Some(Self::Tcp),
            Self::UDP_NUMBER => Some(Self::Udp),
            _ => None,
        }
    }

    /// IP 协议号
    pub fn number(self) -> u8 {
        match self {
            Self::Tcp => Self::TCP_NUMBER,
            Self::Udp => Self::UDP_NUMBER,
        }
    }

    /// 协议名
    pub fn name(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 流键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    /// 传输层协议
    pub protocol: TransportProtocol,
    /// 源端点
    pub src: SocketAddrV4,
    /// 目的端点
    pub dst: SocketAddrV4,
}

impl FlowKey {
    /// 创建流键
    pub fn new(protocol: TransportProtocol, src: SocketAddrV4, dst: SocketAddrV4) -> Self {
        Self { protocol, src, dst }
    }

    /// 由地址和端口分别创建
    pub fn from_parts(
        protocol: TransportProtocol,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Self {
        Self::new(
            protocol,
            SocketAddrV4::new(src_ip, src_port),
            SocketAddrV4::new(dst_ip, dst_port),
        )
    }

    /// 反向键（交换两端）
    pub fn reversed(&self) -> Self {
        Self {
            protocol: self.protocol,
            src: self.dst,
            dst: self.src,
        }
    }
}

impl fmt::Display for FlowKey {
    /// 连接跟踪风格：`tcp 6 src=1.2.3.4 dst=5.6.7.8 sport=1 dport=2`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} src={} dst={} sport={} dport={}",
            self.protocol,
            self.protocol.number(),
            self.src.ip(),
            self.dst.ip(),
            self.src.port(),
            self.dst.port()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = FlowKey::from_parts(
            TransportProtocol::Tcp,
            Ipv4Addr::new(10, 0, 0, 1),
            1234,
            Ipv4Addr::new(10, 0, 0, 2),
            80,
        );
        assert_eq!(
            key.to_string(),
            "tcp 6 src=10.0.0.1 dst=10.0.0.2 sport=1234 dport=80"
        );
    }

    #[test]
    fn test_reversed_twice_is_identity() {
        let key = FlowKey::from_parts(
            TransportProtocol::Udp,
            Ipv4Addr::new(192, 168, 1, 1),
            53000,
            Ipv4Addr::new(8, 8, 8, 8),
            53,
        );
        assert_ne!(key, key.reversed());
        assert_eq!(key, key.reversed().reversed());
    }

    #[test]
    fn test_protocol_numbers() {
        assert_eq!(TransportProtocol::from_number(6), Some(TransportProtocol::Tcp));
        assert_eq!(TransportProtocol::from_number(17), Some(TransportProtocol::Udp));
        assert_eq!(TransportProtocol::from_number(1), None);
    }
}
