//! 报文头解析
//!
//! 只解析 IPv4。IP 头长度取 IHL×4；TCP 载荷从 TCP 头的数据偏移（32 位字）
//! 之后开始；UDP 载荷固定在 8 字节头之后。所有偏移都先做越界检查，
//! 越界的报文作为畸形报文返回错误，由管线原样放行。

use crate::error::{ClassifierError, Result};
use crate::packet::key::{FlowKey, TransportProtocol};
use std::net::Ipv4Addr;

/// IPv4 最小头长度
pub const IPV4_MIN_HEADER_LEN: usize = 20;
/// TCP 最小头长度
pub const TCP_MIN_HEADER_LEN: usize = 20;
/// UDP 头长度
pub const UDP_HEADER_LEN: usize = 8;

/// 传输层分派
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// 其他协议（携带 IP 协议号）
    Unsupported(u8),
}

impl Transport {
    /// 由 IP 协议号确定分派
    pub fn from_number(number: u8) -> Self {
        match TransportProtocol::from_number(number) {
            Some(TransportProtocol::Tcp) => Self::Tcp,
            Some(TransportProtocol::Udp) => Self::Udp,
            None => Self::Unsupported(number),
        }
    }

    /// 对应的受支持协议
    pub fn protocol(self) -> Option<TransportProtocol> {
        match self {
            Self::Tcp => Some(TransportProtocol::Tcp),
            Self::Udp => Some(TransportProtocol::Udp),
            Self::Unsupported(_) => None,
        }
    }

    /// 计算传输层头长度，即载荷在传输层段内的偏移
    pub fn header_len(self, segment: &[u8]) -> Result<usize> {
        match self {
            Self::Tcp => {
                let offset_byte = *segment
                    .get(12)
                    .ok_or_else(|| ClassifierError::malformed_packet("truncated TCP header"))?;
                let len = usize::from(offset_byte >> 4) * 4;
                if len < TCP_MIN_HEADER_LEN {
                    return Err(ClassifierError::malformed_packet(format!(
                        "TCP data offset {} below minimum",
                        len
                    )));
                }
                if len > segment.len() {
                    return Err(ClassifierError::malformed_packet(format!(
                        "TCP header length {} exceeds segment length {}",
                        len,
                        segment.len()
                    )));
                }
                Ok(len)
            }
            Self::Udp => {
                if segment.len() < UDP_HEADER_LEN {
                    return Err(ClassifierError::malformed_packet("truncated UDP header"));
                }
                Ok(UDP_HEADER_LEN)
            }
            Self::Unsupported(number) => Err(ClassifierError::UnsupportedTransport(number)),
        }
    }
}

/// 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPacket<'a> {
    /// 按报文方向得到的流键
    pub key: FlowKey,
    /// 应用层载荷
    pub payload: &'a [u8],
}

/// 读取 IPv4 头中的传输层协议号
pub fn transport_of(packet: &[u8]) -> Result<Transport> {
    check_ipv4(packet)?;
    Ok(Transport::from_number(packet[9]))
}

fn check_ipv4(packet: &[u8]) -> Result<usize> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return Err(ClassifierError::malformed_packet(format!(
            "packet length {} shorter than an IPv4 header",
            packet.len()
        )));
    }

    let version = packet[0] >> 4;
    if version != 4 {
        return Err(ClassifierError::malformed_packet(format!(
            "unsupported IP version {}",
            version
        )));
    }

    let ihl = usize::from(packet[0] & 0x0f) * 4;
    if ihl < IPV4_MIN_HEADER_LEN || ihl > packet.len() {
        return Err(ClassifierError::malformed_packet(format!(
            "IPv4 header length {} invalid for packet length {}",
            ihl,
            packet.len()
        )));
    }

    Ok(ihl)
}

/// 解析 IPv4 报文，得到流键和应用层载荷
pub fn parse(packet: &[u8]) -> Result<ParsedPacket<'_>> {
    let ihl = check_ipv4(packet)?;
    let transport = Transport::from_number(packet[9]);

    let segment = &packet[ihl..];
    let header_len = transport.header_len(segment)?;
    let protocol = transport
        .protocol()
        .ok_or_else(|| ClassifierError::internal_error("transport without protocol"))?;

    let src_ip = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
    let dst_ip = Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]);
    let src_port = u16::from_be_bytes([segment[0], segment[1]]);
    let dst_port = u16::from_be_bytes([segment[2], segment[3]]);

    let key = FlowKey::from_parts(protocol, src_ip, src_port, dst_ip, dst_port);
    tracing::trace!(flow = %key, "constructed flow key");

    Ok(ParsedPacket {
        key,
        payload: &segment[header_len..],
    })
}
