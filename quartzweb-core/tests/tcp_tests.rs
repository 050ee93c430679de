//! Serving real sockets on the loopback interface

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use quartzweb_core::config::ServerConfig;
use quartzweb_core::http::{HttpServer, Router};
use quartzweb_core::storage::DiskTempStore;

fn start(router: Router, config: ServerConfig) -> (std::net::SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskTempStore::new(dir.path()).unwrap());
    let server = HttpServer::from_config(&config, router, store);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || server.serve_listener(listener));
    (addr, dir)
}

fn exchange(addr: std::net::SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[test]
fn test_form_post_over_loopback() {
    let mut router = Router::new();
    router.add_http_fn("/sum", |_, request, response, _| {
        let total: i64 = request
            .parameters()
            .get_all("n")
            .filter_map(|v| v.parse::<i64>().ok())
            .sum();
        response.set_body("text/plain", total.to_string());
        Ok(())
    });
    let (addr, _dir) = start(router, ServerConfig::default());

    let body = "n=4&n=5&n=33";
    let request = format!(
        "POST /sum HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = exchange(addr, request.as_bytes());

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("\r\n\r\n42"));
}

#[test]
fn test_connections_are_served_concurrently() {
    let mut router = Router::new();
    router.add_http_fn("/slow", |_, _, response, _| {
        thread::sleep(Duration::from_millis(200));
        response.set_body("text/plain", "late");
        Ok(())
    });
    router.add_http_fn("/fast", |_, _, response, _| {
        response.set_body("text/plain", "early");
        Ok(())
    });
    let (addr, _dir) = start(router, ServerConfig::default());

    let slow = thread::spawn(move || exchange(addr, b"GET /slow HTTP/1.1\r\n\r\n"));
    thread::sleep(Duration::from_millis(20));
    let started = std::time::Instant::now();
    let fast = exchange(addr, b"GET /fast HTTP/1.1\r\n\r\n");

    assert!(fast.ends_with("early"));
    assert!(started.elapsed() < Duration::from_millis(150));
    assert!(slow.join().unwrap().ends_with("late"));
}

#[test]
fn test_oversized_upload_gets_413_before_body_is_sent() {
    let config = ServerConfig { max_body_size: 1024, ..ServerConfig::default() };
    let (addr, _dir) = start(Router::new(), config);

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nContent-Type: application/octet-stream\r\nContent-Length: 10000000\r\n\r\n")
        .unwrap();
    stream.write_all(&[0u8; 8192]).unwrap();
    stream.shutdown(Shutdown::Write).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 413 Request Entity Too Large\r\n"));
}
