//! End-to-end coverage over a real loopback socket, exercising spec §8's
//! concrete scenarios the way a real client would see them: full RESP
//! framing, not direct calls into `command::dispatch`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use redis_lite::config::ServerConfig;
use redis_lite::server;

/// Spawns a server on a fixed high port and returns a connected client
/// once the listener accepts, retrying briefly since the dispatcher and
/// listener threads start up asynchronously.
fn start_server(port: u16) {
    let mut config = ServerConfig::default();
    config.port = port;
    config.rdb_enabled = false;
    std::thread::spawn(move || {
        let _ = server::run(config);
    });
}

fn connect(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
            stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            return stream;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server never accepted a connection on port {port}");
}

fn encode(argv: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", argv.len()).into_bytes();
    for arg in argv {
        out.extend_from_slice(format!("${}\r\n{arg}\r\n", arg.len()).as_bytes());
    }
    out
}

/// Reads exactly one reply frame (simple/error/integer/bulk/array),
/// returning it as raw bytes for substring assertions.
fn read_reply(stream: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).expect("reply");
    String::from_utf8_lossy(&buf[..n]).to_string()
}

fn send(stream: &mut TcpStream, argv: &[&str]) -> String {
    stream.write_all(&encode(argv)).unwrap();
    read_reply(stream)
}

#[test]
fn set_get_del_round_trip_over_the_wire() {
    start_server(16379);
    let mut client = connect(16379);

    assert_eq!(send(&mut client, &["SET", "greeting", "hello"]), "+OK\r\n");
    assert_eq!(send(&mut client, &["GET", "greeting"]), "$5\r\nhello\r\n");
    assert_eq!(send(&mut client, &["DEL", "greeting"]), ":1\r\n");
    assert_eq!(send(&mut client, &["GET", "greeting"]), "$-1\r\n");
}

#[test]
fn expire_and_ttl_observe_the_deadline() {
    start_server(16380);
    let mut client = connect(16380);

    send(&mut client, &["SET", "k", "v"]);
    assert_eq!(send(&mut client, &["EXPIRE", "k", "100"]), ":1\r\n");
    let ttl_reply = send(&mut client, &["TTL", "k"]);
    assert!(ttl_reply.starts_with(':'));
    assert_ne!(ttl_reply.trim(), ":-1");
}

#[test]
fn multi_exec_applies_queued_commands_atomically() {
    start_server(16381);
    let mut client = connect(16381);

    assert_eq!(send(&mut client, &["MULTI"]), "+OK\r\n");
    assert_eq!(send(&mut client, &["SET", "a", "1"]), "+QUEUED\r\n");
    assert_eq!(send(&mut client, &["SET", "b", "2"]), "+QUEUED\r\n");
    let exec_reply = send(&mut client, &["EXEC"]);
    assert!(exec_reply.starts_with("*2\r\n"));
    assert_eq!(send(&mut client, &["GET", "a"]), "$1\r\n1\r\n");
    assert_eq!(send(&mut client, &["GET", "b"]), "$1\r\n2\r\n");
}

#[test]
fn watch_aborts_exec_when_another_connection_wrote_first() {
    start_server(16382);
    let mut watcher = connect(16382);
    let mut other = connect(16382);

    send(&mut watcher, &["SET", "k", "1"]);
    assert_eq!(send(&mut watcher, &["WATCH", "k"]), "+OK\r\n");
    assert_eq!(send(&mut watcher, &["MULTI"]), "+OK\r\n");
    assert_eq!(send(&mut watcher, &["SET", "k", "2"]), "+QUEUED\r\n");

    // A second connection mutates the watched key first.
    send(&mut other, &["SET", "k", "99"]);

    assert_eq!(send(&mut watcher, &["EXEC"]), "*-1\r\n");
    assert_eq!(send(&mut watcher, &["GET", "k"]), "$2\r\n99\r\n");
}

#[test]
fn publish_delivers_to_subscribed_connection() {
    start_server(16383);
    let mut subscriber = connect(16383);
    let mut publisher = connect(16383);

    let sub_reply = send(&mut subscriber, &["SUBSCRIBE", "news"]);
    assert!(sub_reply.contains("subscribe"));

    assert_eq!(send(&mut publisher, &["PUBLISH", "news", "hello"]), ":1\r\n");

    let pushed = read_reply(&mut subscriber);
    assert!(pushed.contains("message"));
    assert!(pushed.contains("hello"));
}

#[test]
fn zset_scenario_from_spec_over_the_wire() {
    start_server(16384);
    let mut client = connect(16384);

    send(&mut client, &["ZADD", "lb", "100", "a", "75", "b", "150", "c"]);
    let range = send(&mut client, &["ZRANGE", "lb", "0", "-1", "WITHSCORES"]);
    assert!(range.starts_with("*6\r\n"));
    assert_eq!(send(&mut client, &["ZINCRBY", "lb", "50", "b"]), "$3\r\n125\r\n");
}
