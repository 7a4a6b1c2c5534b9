use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use sock_bench::client::{self, ClientConfig};
use sock_bench::endpoint::{Endpoint, Listener, Stream};
use sock_bench::server::{drain, Accept, BlockingAcceptor, PolledAcceptor, LISTEN_BACKLOG};

fn ephemeral_inet() -> Endpoint {
    Endpoint::Inet(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)))
}

fn temp_socket_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sock-bench-{}-{}.sock", tag, std::process::id()))
}

fn client_run(endpoint: Endpoint, num_packets: u64, packet_size: usize) {
    client::run(&ClientConfig {
        endpoint,
        num_packets,
        packet_size,
    })
    .unwrap();
}

#[test]
fn inet_roundtrip_exact_bytes() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let bound = listener.local_endpoint().unwrap();

    let server = thread::spawn(move || {
        let mut stream = listener.accept().unwrap();
        drain(&mut stream).unwrap()
    });

    client_run(bound, 100, 1024);
    assert_eq!(server.join().unwrap(), 100 * 1024);
}

#[test]
fn inet_roundtrip_zero_packets() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let bound = listener.local_endpoint().unwrap();

    let server = thread::spawn(move || {
        let mut stream = listener.accept().unwrap();
        drain(&mut stream).unwrap()
    });

    client_run(bound, 0, 500);
    assert_eq!(server.join().unwrap(), 0);
}

#[test]
fn unix_roundtrip_exact_bytes() {
    let path = temp_socket_path("roundtrip");
    let endpoint = Endpoint::Local(path.clone());
    let listener = Listener::bind(&endpoint, LISTEN_BACKLOG).unwrap();

    let server = thread::spawn(move || {
        let mut stream = listener.accept().unwrap();
        drain(&mut stream).unwrap()
    });

    client_run(endpoint, 50, 500);
    assert_eq!(server.join().unwrap(), 50 * 500);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn unix_rebind_replaces_stale_path() {
    let path = temp_socket_path("rebind");
    let endpoint = Endpoint::Local(path.clone());

    // first server run leaves its socket file behind
    drop(Listener::bind(&endpoint, LISTEN_BACKLOG).unwrap());
    assert!(path.exists());

    // the restarted server must remove the stale file and accept again
    let listener = Listener::bind(&endpoint, LISTEN_BACKLOG).unwrap();
    let server = thread::spawn(move || {
        let mut stream = listener.accept().unwrap();
        drain(&mut stream).unwrap()
    });

    client_run(endpoint, 3, 100);
    assert_eq!(server.join().unwrap(), 300);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn blocking_accepts_are_serial_and_fifo() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let bound = listener.local_endpoint().unwrap();
    let mut acceptor = BlockingAcceptor::new(listener);

    // three peers queue up in the backlog, each sending a distinct amount
    for bytes in [1usize, 2, 3] {
        let mut peer = Stream::connect(&bound).unwrap();
        peer.write_all(&vec![0u8; bytes]).unwrap();
    }

    let mut drained = Vec::new();
    for _ in 0..3 {
        let mut stream = acceptor.next_conn().unwrap().unwrap();
        drained.push(drain(&mut stream).unwrap());
    }
    assert_eq!(drained, vec![1, 2, 3]);
}

#[test]
fn polled_acceptor_idle_wait_is_bounded() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let mut acceptor = PolledAcceptor::new(listener, Duration::from_millis(200)).unwrap();

    let start = Instant::now();
    assert!(acceptor.next_conn().unwrap().is_none());
    let waited = start.elapsed();

    // the wait blocks for the timeout instead of spinning, and then returns
    assert!(waited >= Duration::from_millis(100), "returned early: {:?}", waited);
    assert!(waited < Duration::from_secs(5), "wait never timed out: {:?}", waited);
}

#[test]
fn polled_acceptor_picks_up_connection() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let bound = listener.local_endpoint().unwrap();
    let mut acceptor = PolledAcceptor::new(listener, Duration::from_millis(200)).unwrap();

    let mut peer = Stream::connect(&bound).unwrap();
    peer.write_all(&[0u8; 64]).unwrap();
    drop(peer);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut stream = loop {
        match acceptor.next_conn().unwrap() {
            Some(stream) => break stream,
            None => assert!(Instant::now() < deadline, "connection never surfaced"),
        }
    };
    assert_eq!(drain(&mut stream).unwrap(), 64);
}

#[test]
fn polled_acceptor_drains_queued_backlog() {
    let listener = Listener::bind(&ephemeral_inet(), LISTEN_BACKLOG).unwrap();
    let bound = listener.local_endpoint().unwrap();
    let mut acceptor = PolledAcceptor::new(listener, Duration::from_millis(200)).unwrap();

    // both connections are queued before the first wait; the second must
    // still be surfaced even though readiness only fired once
    let peer_a = Stream::connect(&bound).unwrap();
    let peer_b = Stream::connect(&bound).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut accepted = 0;
    while accepted < 2 {
        match acceptor.next_conn().unwrap() {
            Some(_stream) => accepted += 1,
            None => assert!(Instant::now() < deadline, "backlog connection stranded"),
        }
    }

    drop(peer_a);
    drop(peer_b);
}
