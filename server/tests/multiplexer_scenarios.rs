/// Integration tests for the connection Multiplexer over real UNIX sockets
///
/// Each test binds a collector socket in its own temporary directory and
/// drives `poll()` by hand, the way the ingestion worker would.

use std::{
    io::Write,
    os::unix::net::UnixStream,
    path::PathBuf,
    time::{Duration, Instant},
};

use opus_server::{Multiplexer, ServerConfig};
use opus_server::transport::ListenAddr;
use opus_shared::{
    Encoder, GenericMessage, MessageHeader, PayloadType, RawMessage, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Fixture {
    _dir: tempfile::TempDir,
    path: PathBuf,
    mux: Multiplexer,
}

fn fixture() -> Fixture {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("collector.sock");
    let config = ServerConfig {
        poll_timeout: Duration::from_millis(20),
        ..ServerConfig::default()
    }
    .with_listen_addr(ListenAddr::unix(&path));
    let mux = Multiplexer::bind(&config).expect("bind");
    Fixture {
        _dir: dir,
        path,
        mux,
    }
}

/// Polls until `done` holds for everything collected so far
fn poll_until(
    mux: &mut Multiplexer,
    mut done: impl FnMut(&Multiplexer, &[RawMessage]) -> bool,
) -> Vec<RawMessage> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut collected = Vec::new();
    while !done(mux, &collected) {
        assert!(Instant::now() < deadline, "timed out waiting on the multiplexer");
        collected.extend(mux.poll().expect("poll"));
    }
    collected
}

fn frame(pid: i32, payload: &[u8]) -> Vec<u8> {
    let header = MessageHeader {
        timestamp: 1,
        pid,
        tid: pid,
        payload_type: PayloadType::Generic.to_u32(),
        payload_len: payload.len() as u32,
        sys_time: 1,
    };
    Encoder::new().encode(&header, payload).to_vec()
}

fn our_pid() -> i32 {
    std::process::id() as i32
}

#[test]
fn test_scenario_a_split_writes_yield_one_message() {
    let mut fx = fixture();
    let mut client = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);

    let bytes = frame(our_pid(), b"hello-world!!");
    client.write_all(&bytes[..HEADER_SIZE + 3]).expect("first write");

    // partial payload: nothing completes yet
    for _ in 0..3 {
        assert!(fx.mux.poll().expect("poll").is_empty());
    }

    client.write_all(&bytes[HEADER_SIZE + 3..]).expect("second write");
    let messages = poll_until(&mut fx.mux, |_, got| !got.is_empty());

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload(), b"hello-world!!");
    assert_eq!(messages[0].header().payload_len, 13);
}

#[test]
fn test_scenario_c_last_connection_synthesizes_disconnect() {
    let mut fx = fixture();
    let first = UnixStream::connect(&fx.path).expect("connect");
    let second = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 2);

    let pid = our_pid();
    assert_eq!(fx.mux.ps().get(&pid), Some(&2));

    drop(first);
    let events = poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);
    assert!(events.is_empty());
    assert_eq!(fx.mux.ps().get(&pid), Some(&1));

    drop(second);
    let events = poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 0);
    assert!(fx.mux.ps().is_empty());
    assert_eq!(events.len(), 1);

    let header = events[0].header();
    assert_eq!(header.pid, pid);
    assert_eq!(header.tid, pid);
    assert_eq!(header.payload_type, PayloadType::Generic.to_u32());
    let generic: GenericMessage = events[0].decode().expect("generic");
    assert!(generic.is_disconnect());
    assert!(generic.msg_desc.starts_with("Client socket: "));
}

#[test]
fn test_scenario_d_detach_unknown_pid() {
    let mut fx = fixture();
    let _client = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);
    let before = fx.mux.ps();

    let result = fx.mux.detach(99);
    assert_eq!(result.closed, 0);
    assert!(result.events.is_empty());
    assert_eq!(fx.mux.ps(), before);
    assert_eq!(fx.mux.connection_count(), 1);
}

#[test]
fn test_detach_closes_all_and_listener_stays_open() {
    let mut fx = fixture();
    let _a = UnixStream::connect(&fx.path).expect("connect");
    let _b = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 2);

    let pid = our_pid();
    let result = fx.mux.detach(pid);
    assert_eq!(result.closed, 2);
    assert_eq!(result.events.len(), 1);
    assert!(!fx.mux.ps().contains_key(&pid));

    // detaching again is harmless
    assert_eq!(fx.mux.detach(pid).closed, 0);

    let mut late = UnixStream::connect(&fx.path).expect("listener still accepting");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);
    late.write_all(&frame(pid, b"after")).expect("write");
    let messages = poll_until(&mut fx.mux, |_, got| !got.is_empty());
    assert_eq!(messages[0].payload(), b"after");
}

#[test]
fn test_ps_is_idempotent() {
    let mut fx = fixture();
    let _client = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);

    assert_eq!(fx.mux.ps(), fx.mux.ps());
}

#[test]
fn test_oversized_header_drops_only_that_connection() {
    let mut fx = fixture();
    let mut bad = UnixStream::connect(&fx.path).expect("connect");
    let mut good = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 2);

    let header = MessageHeader {
        payload_type: PayloadType::Generic.to_u32(),
        payload_len: u32::MAX,
        ..MessageHeader::default()
    };
    bad.write_all(&header.to_bytes()).expect("write");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);

    good.write_all(&frame(our_pid(), b"still here")).expect("write");
    let messages = poll_until(&mut fx.mux, |_, got| !got.is_empty());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload(), b"still here");
}

#[test]
fn test_payload_limit_is_held_to_the_ceiling() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("collector.sock");
    let config = ServerConfig {
        poll_timeout: Duration::from_millis(20),
        max_payload_len: usize::MAX,
        ..ServerConfig::default()
    }
    .with_listen_addr(ListenAddr::unix(&path));
    assert!(Multiplexer::bind(&config).is_err());

    // a transport bound directly still caps the limit at the ceiling
    let transport = opus_server::transport::bind(&config).expect("bind transport");
    let mut mux = Multiplexer::with_transport(transport, &config);
    let mut client = UnixStream::connect(&path).expect("connect");
    poll_until(&mut mux, |mux, _| mux.connection_count() == 1);

    let header = MessageHeader {
        payload_type: PayloadType::Generic.to_u32(),
        payload_len: (MAX_PAYLOAD_SIZE + 1) as u32,
        ..MessageHeader::default()
    };
    client.write_all(&header.to_bytes()).expect("write");
    poll_until(&mut mux, |mux, _| mux.connection_count() == 0);
}

#[test]
fn test_close_removes_socket_file() {
    let mut fx = fixture();
    let _client = UnixStream::connect(&fx.path).expect("connect");
    poll_until(&mut fx.mux, |mux, _| mux.connection_count() == 1);

    let events = fx.mux.close();
    assert_eq!(events.len(), 1);
    assert_eq!(fx.mux.connection_count(), 0);
    assert!(!fx.path.exists());
}

#[test]
fn test_stale_socket_file_is_replaced() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stale.sock");
    let stale = std::os::unix::net::UnixListener::bind(&path).expect("stale bind");
    drop(stale);
    assert!(path.exists());

    let config = ServerConfig::default().with_listen_addr(ListenAddr::unix(&path));
    let mux = Multiplexer::bind(&config).expect("bind over stale socket");
    assert_eq!(mux.local_addr(), &ListenAddr::unix(&path));
}

#[test]
fn test_tcp_peers_are_grouped_as_unknown() {
    init_logger();
    let config = ServerConfig {
        poll_timeout: Duration::from_millis(20),
        ..ServerConfig::default()
    }
    .with_listen_addr(ListenAddr::tcp("127.0.0.1:0"));
    let mut mux = Multiplexer::bind(&config).expect("bind");

    let ListenAddr::Tcp(bound) = mux.local_addr().clone() else {
        panic!("expected a tcp address");
    };
    let _client = std::net::TcpStream::connect(bound.as_str()).expect("connect");
    poll_until(&mut mux, |mux, _| mux.connection_count() == 1);

    assert_eq!(mux.ps().get(&-1), Some(&1));
}
