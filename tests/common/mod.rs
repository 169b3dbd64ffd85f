//! 集成测试公共工具

#![allow(dead_code)]

use l7_detector::core::pattern::{CompileFlags, ExecFlags};
use l7_detector::{Classifier, FlowKey, Mark, Pattern, TransportProtocol};
use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

pub const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
pub const SERVER: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

/// 客户端到服务器的 TCP 流键
pub fn tcp_key(client_port: u16, server_port: u16) -> FlowKey {
    FlowKey::new(
        TransportProtocol::Tcp,
        SocketAddrV4::new(CLIENT, client_port),
        SocketAddrV4::new(SERVER, server_port),
    )
}

/// 构造 IPv4 报文
pub fn ipv4_packet(protocol: u8, src: SocketAddrV4, dst: SocketAddrV4, segment: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    let total = (20 + segment.len()) as u16;
    packet[2..4].copy_from_slice(&total.to_be_bytes());
    packet[8] = 64;
    packet[9] = protocol;
    packet[12..16].copy_from_slice(&src.ip().octets());
    packet[16..20].copy_from_slice(&dst.ip().octets());
    packet.extend_from_slice(segment);
    packet
}

/// 构造 TCP 报文（20 字节头，无选项）
pub fn tcp_packet(src: SocketAddrV4, dst: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let mut segment = vec![0u8; 20];
    segment[0..2].copy_from_slice(&src.port().to_be_bytes());
    segment[2..4].copy_from_slice(&dst.port().to_be_bytes());
    segment[12] = 5 << 4;
    segment[13] = 0x18;
    segment.extend_from_slice(payload);
    ipv4_packet(6, src, dst, &segment)
}

/// 构造 UDP 报文
pub fn udp_packet(src: SocketAddrV4, dst: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let mut segment = vec![0u8; 8];
    segment[0..2].copy_from_slice(&src.port().to_be_bytes());
    segment[2..4].copy_from_slice(&dst.port().to_be_bytes());
    segment[4..6].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    segment.extend_from_slice(payload);
    ipv4_packet(17, src, dst, &segment)
}

/// 按流键方向构造 TCP 报文
pub fn tcp_for(key: &FlowKey, payload: &[u8]) -> Vec<u8> {
    tcp_packet(key.src, key.dst, payload)
}

/// 默认标志编译的特征
pub fn pattern(name: &str, re: &str, mark: u32) -> Pattern {
    Pattern::new(
        name,
        re.as_bytes(),
        CompileFlags::default(),
        ExecFlags::default(),
        Mark::new(mark).unwrap(),
    )
    .unwrap()
}

/// 由若干 (名称, 正则, 标记) 组成的分类器
pub fn classifier(rules: &[(&str, &str, u32)]) -> Classifier {
    Classifier::new(
        rules
            .iter()
            .map(|(name, re, mark)| pattern(name, re, *mark))
            .collect(),
    )
}

/// 写入特征文件
pub fn write_signature(dir: &Path, protocol: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{}.pat", protocol)), body).unwrap();
}

/// 写入协议映射配置
pub fn write_config(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}
