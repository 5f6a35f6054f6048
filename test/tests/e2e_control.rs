/// End-to-end command-and-control: ControlClient -> ControlServer -> bridge
/// -> ingestion worker

use std::{collections::BTreeMap, process};

use serde_json::json;

use opus_shared::ProducerStatus;
use opus_test::{is_disconnect, Collector};

fn own_pid() -> i32 {
    process::id() as i32
}

#[test]
fn test_ps_and_status_report_live_connections() {
    let collector = Collector::start_with_control();
    let client = collector.control_client();
    let _first = collector.sender();
    let _second = collector.sender();
    collector.wait_for_connections(2);

    let ps = client.ps().expect("ps");
    assert!(ps.success);
    assert_eq!(ps.pid_map, Some(BTreeMap::from([(own_pid(), 2)])));
    assert_eq!(client.ps().expect("ps again"), ps);

    let status = client.status().expect("status");
    assert_eq!(
        status.producer,
        Some(ProducerStatus {
            status: "running".to_string(),
            connections: 2,
            owners: 1,
        })
    );
}

#[test]
fn test_detach_closes_every_connection_of_the_pid() {
    let collector = Collector::start_with_control();
    let client = collector.control_client();
    let _first = collector.sender();
    let _second = collector.sender();
    collector.wait_for_connections(2);

    let detached = client.detach(own_pid()).expect("detach");
    assert!(detached.success);
    assert_eq!(detached.msg.as_deref(), Some("Success. 2 connections closed."));

    let messages = collector.collect_until(|messages| messages.iter().any(is_disconnect));
    assert_eq!(messages.iter().filter(|m| is_disconnect(m)).count(), 1);
    assert_eq!(client.ps().expect("ps").pid_map, Some(BTreeMap::new()));

    let again = client.detach(own_pid()).expect("detach again");
    assert!(!again.success);
    assert_eq!(
        again.msg,
        Some(format!("Pid {} not connected.", own_pid()))
    );

    // listener still takes new connections
    let _third = collector.sender();
    collector.wait_for_connections(1);
}

#[test]
fn test_bad_requests_get_failure_responses() {
    let collector = Collector::start_with_control();
    let client = collector.control_client();

    let missing = client
        .request(&json!({"cmd": "detach"}))
        .expect("missing pid");
    assert_eq!(missing["success"], json!(false));
    assert_eq!(missing["msg"], json!("Missing pid argument."));

    let unknown = client
        .request(&json!({"cmd": "frobnicate"}))
        .expect("unknown");
    assert_eq!(unknown["success"], json!(false));
    assert_eq!(unknown["msg"], json!("frobnicate is not a valid command."));

    let absent = client.detach(99_999_999).expect("absent pid");
    assert!(!absent.success);
}
