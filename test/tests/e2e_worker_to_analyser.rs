/// End-to-end: instrumented client -> ingestion worker -> batch channel ->
/// analyser -> graph store

use std::{
    iter, process,
    time::{Duration, Instant},
};

use opus_graph::{Analyser, GraphStore, MemoryGraphStore, NodeId, RelType};
use opus_shared::AggregationMessage;
use opus_test::{call, startup, Collector};

/// Event times of the chain under `anchor`, earliest first
fn stored_chain(store: &MemoryGraphStore, anchor: NodeId) -> Vec<u64> {
    let mut times = Vec::new();
    let mut next = store
        .outgoing(anchor, RelType::IoEvents)
        .expect("io events")
        .first()
        .map(|rel| rel.end);
    while let Some(id) = next {
        times.push(store.node(id).expect("event").prop_u64("before_time").expect("time"));
        next = store
            .outgoing(id, RelType::PrevEvent)
            .expect("prev")
            .first()
            .map(|rel| rel.end);
    }
    times.reverse();
    times
}

fn send_session(collector: &Collector) {
    let mut sender = collector.sender();
    collector.wait_for_connections(1);
    sender.send(&startup("/bin/cp")).expect("startup");
    sender
        .send(&call("open", &[("pathname", "/tmp/in")], 3, 5))
        .expect("open");
    sender
        .send(&AggregationMessage::new(vec![
            call("read", &[("fd", "3")], 64, 30),
            call("read", &[("fd", "3")], 64, 10),
            call("read", &[("fd", "3")], 64, 20),
        ]))
        .expect("aggregate");
}

#[test]
fn test_out_of_order_aggregate_is_chained_in_order() {
    let collector = Collector::start();
    send_session(&collector);

    let mut analyser = Analyser::posix(MemoryGraphStore::new()).expect("analyser");
    let deadline = Instant::now() + Duration::from_secs(5);
    while analyser.stats().disconnects == 0 {
        assert!(Instant::now() < deadline, "analyser never saw the disconnect");
        if let Some(batch) = collector
            .receiver()
            .receive_timeout(Duration::from_millis(50))
            .expect("channel")
        {
            analyser.analyse_batch(batch);
        }
    }

    let stats = analyser.stats();
    assert_eq!(stats.processes, 1);
    assert_eq!(stats.anchors, 1);
    assert_eq!(stats.events, 3);
    assert_eq!(stats.failures, 0);
    assert!(analyser.process_node(process::id() as i32).is_none());

    let store = analyser.store();
    let anchors = store.relationships(RelType::IoEvents);
    assert_eq!(anchors.len(), 1);
    assert_eq!(stored_chain(store, anchors[0].start), vec![10, 20, 30]);
    assert_eq!(store.relationship_count(RelType::PrevEvent), 2);
}

#[test]
fn test_analyser_runs_until_the_worker_stops() {
    let collector = Collector::start();
    send_session(&collector);
    // the worker has read to EOF once the connection is gone
    collector.wait_for_connections(0);

    let receiver = collector.receiver().clone();
    drop(collector);

    let mut analyser = Analyser::posix(MemoryGraphStore::new()).expect("analyser");
    analyser.run(iter::from_fn(|| receiver.receive_blocking().ok()));

    assert_eq!(analyser.stats().events, 3);
    assert_eq!(analyser.stats().disconnects, 1);
}
