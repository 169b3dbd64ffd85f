//! 数据包管线测试

mod common;

use common::{classifier, ipv4_packet, tcp_for, tcp_key, tcp_packet, udp_packet, CLIENT, SERVER};
use l7_detector::{
    EventKind, Filter, FilterConfig, FlowMark, LifecycleEvent, PacketOutcome, TransportProtocol,
};
use std::net::SocketAddrV4;

fn filter(rules: &[(&str, &str, u32)], config: FilterConfig) -> Filter {
    Filter::new(config, classifier(rules)).unwrap()
}

fn http_filter() -> Filter {
    filter(&[("http", "^get |^post |^head ", 80)], FilterConfig::default())
}

#[test]
fn test_first_packet_classified() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let verdict = filter.handle_packet(&tcp_for(&key, b"GET / HTTP/1.1\r\n"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Classified);
    assert_eq!(verdict.mark, 80);

    let verdict = filter.handle_packet(&tcp_for(&key, b"Host: example.com\r\n"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Cached);
    assert_eq!(verdict.mark, 80);
}

#[test]
fn test_reply_direction_shares_flow() {
    let filter = filter(&[("http", "^get .*200 ok", 80)], FilterConfig::default());
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let request = filter.handle_packet(&tcp_for(&key, b"GET / HTTP/1.1\r\n\r\n"), 0);
    assert_eq!(request.outcome, PacketOutcome::Pending);
    assert_eq!(request.mark, FlowMark::WIRE_PENDING);

    let reply = filter.handle_packet(&tcp_for(&key.reversed(), b"HTTP/1.1 200 OK\r\n"), 0);
    assert_eq!(reply.outcome, PacketOutcome::Classified);
    assert_eq!(reply.mark, 80);
    assert_eq!(filter.table().len(), 1);
}

#[test]
fn test_untracked_flow_is_pending_and_not_created() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);

    let verdict = filter.handle_packet(&tcp_for(&key, b"GET / HTTP/1.1\r\n"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Untracked);
    assert_eq!(verdict.mark, FlowMark::WIRE_PENDING);
    assert!(filter.table().is_empty());

    // 通知稍后到达，后续数据包正常分类
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));
    let verdict = filter.handle_packet(&tcp_for(&key, b"GET / HTTP/1.1\r\n"), 0);
    assert_eq!(verdict.mark, 80);
}

#[test]
fn test_gives_up_after_budget() {
    let config = FilterConfig {
        max_packets: 3,
        ..Default::default()
    };
    let filter = filter(&[("ssh", "^ssh-", 22)], config);
    let key = tcp_key(40000, 443);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    for _ in 0..3 {
        let verdict = filter.handle_packet(&tcp_for(&key, b"\x16\x03\x01 hello"), 0);
        assert_eq!(verdict.outcome, PacketOutcome::Pending);
    }
    let verdict = filter.handle_packet(&tcp_for(&key, b"\x17\x03\x03 data"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::GaveUp);
    assert_eq!(verdict.mark, FlowMark::WIRE_REJECTED);

    let flow = filter.table().get(&key).unwrap();
    assert!(flow.snapshot().released);

    let verdict = filter.handle_packet(&tcp_for(&key, b"ssh-2.0"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Cached);
    assert_eq!(verdict.mark, FlowMark::WIRE_REJECTED);
}

#[test]
fn test_empty_payload_packets() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let verdict = filter.handle_packet(&tcp_for(&key, b""), 0);
    assert_eq!(verdict.outcome, PacketOutcome::NoPayload);
    assert_eq!(verdict.mark, FlowMark::WIRE_PENDING);

    filter.handle_packet(&tcp_for(&key, b"POST /form HTTP/1.1\r\n"), 0);
    let verdict = filter.handle_packet(&tcp_for(&key.reversed(), b""), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Cached);
    assert_eq!(verdict.mark, 80);
}

#[test]
fn test_mark_window_preserves_outside_bits() {
    let config = FilterConfig {
        mark_mask: 0x00FF_FFF0,
        ..Default::default()
    };
    let filter = filter(&[("http", "^get ", 80)], config);
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let incoming = 0xAB00_000C;
    let verdict = filter.handle_packet(&tcp_for(&key, b"GET /"), incoming);
    assert_eq!(verdict.mark & !0x00FF_FFF0, incoming);
    assert_eq!((verdict.mark & 0x00FF_FFF0) >> 4, 80);
}

#[test]
fn test_clobber_owns_whole_field() {
    let config = FilterConfig {
        mark_mask: 0x00FF_FFF0,
        clobber_mark: true,
        ..Default::default()
    };
    let filter = filter(&[("http", "^get ", 80)], config);
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let verdict = filter.handle_packet(&tcp_for(&key, b"GET /"), 0xAB00_000C);
    assert_eq!(verdict.mark, 80 << 4);
}

#[test]
fn test_already_marked_bypasses_classification() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let verdict = filter.handle_packet(&tcp_for(&key, b"GET /"), 1234);
    assert_eq!(verdict.outcome, PacketOutcome::AlreadyMarked);
    assert_eq!(verdict.mark, 1234);
    assert_eq!(filter.table().get(&key).unwrap().packets_seen(), 0);

    // 哨兵值不触发跳过
    let verdict = filter.handle_packet(&tcp_for(&key, b"GET /"), FlowMark::WIRE_PENDING);
    assert_eq!(verdict.outcome, PacketOutcome::Classified);
}

#[test]
fn test_clobber_disables_bypass() {
    let config = FilterConfig {
        clobber_mark: true,
        ..Default::default()
    };
    let filter = filter(&[("http", "^get ", 80)], config);
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let verdict = filter.handle_packet(&tcp_for(&key, b"GET /"), 1234);
    assert_eq!(verdict.outcome, PacketOutcome::Classified);
    assert_eq!(verdict.mark, 80);
}

#[test]
fn test_non_tcp_udp_passes_through() {
    let filter = http_filter();
    let icmp = ipv4_packet(
        1,
        SocketAddrV4::new(CLIENT, 0),
        SocketAddrV4::new(SERVER, 0),
        &[8, 0, 0, 0, 0, 1, 0, 1],
    );
    let verdict = filter.handle_packet(&icmp, 0);
    assert_eq!(verdict.outcome, PacketOutcome::PassThrough);
    assert_eq!(verdict.mark, 0);
}

#[test]
fn test_malformed_passes_through() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));

    let mut packet = tcp_for(&key, b"GET /");
    packet[0] = 0x4f;
    let verdict = filter.handle_packet(&packet[..24], 0);
    assert_eq!(verdict.outcome, PacketOutcome::PassThrough);
    assert_eq!(verdict.mark, 0);

    assert_eq!(filter.handle_packet(&[], 0).outcome, PacketOutcome::PassThrough);
    assert_eq!(filter.table().get(&key).unwrap().packets_seen(), 0);
}

#[test]
fn test_first_match_wins_order() {
    let ordered = filter(&[("get", "GET ", 10), ("any", ".*", 20)], FilterConfig::default());
    let swapped = filter(&[("any", ".*", 20), ("get", "GET ", 10)], FilterConfig::default());
    let key = tcp_key(40000, 80);

    for (filter, expected) in [(ordered, 10), (swapped, 20)] {
        filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));
        assert_eq!(filter.handle_packet(&tcp_for(&key, b"GET /x"), 0).mark, expected);
    }
}

#[test]
fn test_udp_flow() {
    let filter = filter(&[("dns", r"^.?.?\x01\x01", 53)], FilterConfig::default());
    let src = SocketAddrV4::new(CLIENT, 53001);
    let dst = SocketAddrV4::new(SERVER, 53);
    filter.handle_event(&LifecycleEvent::new(
        EventKind::New,
        TransportProtocol::Udp.number(),
        src,
        dst,
    ));

    let verdict = filter.handle_packet(&udp_packet(src, dst, b"\x12\x34\x01\x00\x00\x01"), 0);
    assert_eq!(verdict.mark, 53);
}

#[test]
fn test_destroy_then_packets_are_untracked() {
    let filter = http_filter();
    let key = tcp_key(40000, 80);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::New, &key));
    filter.handle_packet(&tcp_for(&key, b"partial"), 0);
    filter.handle_event(&LifecycleEvent::for_key(EventKind::Destroy, &key));
    filter.handle_event(&LifecycleEvent::for_key(EventKind::Destroy, &key));

    assert!(filter.table().is_empty());
    let verdict = filter.handle_packet(&tcp_packet(key.src, key.dst, b"GET /"), 0);
    assert_eq!(verdict.outcome, PacketOutcome::Untracked);
}

#[test]
fn test_non_tcp_udp_events_ignored() {
    let filter = http_filter();
    filter.handle_event(&LifecycleEvent::new(
        EventKind::New,
        1,
        SocketAddrV4::new(CLIENT, 0),
        SocketAddrV4::new(SERVER, 0),
    ));
    assert!(filter.table().is_empty());
}
