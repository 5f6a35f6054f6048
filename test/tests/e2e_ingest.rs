/// End-to-end ingestion: real clients against a running ingestion worker

use std::{process, thread, time::Duration};

use opus_shared::{MessageHeader, PayloadType, MAX_PAYLOAD_SIZE};
use opus_test::{call, is_disconnect, Collector};

fn own_pid() -> i32 {
    process::id() as i32
}

#[test]
fn test_payload_split_across_writes_arrives_once() {
    let collector = Collector::start();
    let mut sender = collector.sender();
    collector.wait_for_connections(1);

    let header = MessageHeader::now(PayloadType::Generic, own_pid(), own_pid(), 13);
    sender.write_raw(&header.to_bytes()).expect("header");
    sender.write_raw(b"hel").expect("first part");
    thread::sleep(Duration::from_millis(60));
    sender.write_raw(b"lo-world!!").expect("second part");

    let messages = collector.collect_until(|messages| !messages.is_empty());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload(), b"hello-world!!");
    assert_eq!(messages[0].header().payload_len, 13);

    let late = collector
        .receiver()
        .receive_timeout(Duration::from_millis(100))
        .expect("channel");
    assert!(late.is_none());
}

#[test]
fn test_disconnect_only_after_last_connection() {
    let collector = Collector::start();
    let first = collector.sender();
    let second = collector.sender();
    collector.wait_for_connections(2);

    drop(first);
    collector.wait_for_connections(1);
    let early = collector
        .receiver()
        .receive_timeout(Duration::from_millis(100))
        .expect("channel");
    assert!(early.map_or(true, |batch| batch.disconnects() == 0));

    drop(second);
    let messages = collector.collect_until(|messages| messages.iter().any(is_disconnect));
    let disconnects: Vec<_> = messages.iter().filter(|m| is_disconnect(m)).collect();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].pid(), own_pid());
    assert_eq!(disconnects[0].header().tid, own_pid());
}

#[test]
fn test_oversized_header_drops_only_its_connection() {
    let collector = Collector::start();
    let mut good = collector.sender();
    let mut bad = collector.sender();
    collector.wait_for_connections(2);

    let header = MessageHeader::now(
        PayloadType::FuncInfo,
        own_pid(),
        own_pid(),
        (MAX_PAYLOAD_SIZE + 1) as u32,
    );
    bad.write_raw(&header.to_bytes()).expect("oversized header");
    collector.wait_for_connections(1);

    good.send(&call("read", &[("fd", "3")], 4, 10)).expect("send");
    let messages = collector.collect_until(|messages| !messages.is_empty());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind(), Ok(PayloadType::FuncInfo));
}

#[test]
fn test_stop_flushes_final_disconnects() {
    let collector = Collector::start();
    let _sender = collector.sender();
    collector.wait_for_connections(1);

    let rest = collector.stop();
    assert_eq!(rest.iter().filter(|m| is_disconnect(m)).count(), 1);
}
