/*
 * parser_wire.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Wire-level tests for the HTTP/1.1 framer: a CLIENT-role parser and a
 * SERVER-role parser on the two ends of an in-memory duplex pipe, so every
 * byte emitted by one side is consumed by the other through the real state
 * machines.
 */

use corriere_core::h1::{HttpParser, Role, State};
use corriere_core::net::NetworkStream;

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn drain_body(parser: &mut HttpParser) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let chunk = parser.recv_body().await.unwrap();
        if chunk.is_empty() {
            return body;
        }
        body.extend_from_slice(&chunk);
    }
}

#[tokio::test]
async fn request_roundtrip_preserves_method_target_headers() {
    let (client_stream, server_stream) = NetworkStream::pair(64 * 1024);
    let mut client = HttpParser::new(client_stream, Role::Client);
    let mut server = HttpParser::new(server_stream, Role::Server);

    let headers = pairs(&[
        ("Host", "www.example.com"),
        ("Accept", "*/*"),
        ("X-Custom", "a, b; c"),
    ]);
    client
        .send_method_line("GET", "/some/path?q=1", "HTTP/1.1")
        .await
        .unwrap();
    client.send_headers(&headers).await.unwrap();
    client.send_body(b"").await.unwrap();

    let (method, target, protocol) = server.recv_method_line().await.unwrap();
    assert_eq!(method, "GET");
    assert_eq!(target, "/some/path?q=1");
    assert_eq!(protocol, "HTTP/1.1");
    assert_eq!(server.recv_headers().await.unwrap(), headers);
    assert!(drain_body(&mut server).await.is_empty());
    assert_eq!(server.send_state(), State::SendStatusLine);
}

#[tokio::test]
async fn content_length_bodies_roundtrip_exactly() {
    for size in [0usize, 1, 4096, 10_000] {
        let (client_stream, server_stream) = NetworkStream::pair(256 * 1024);
        let mut client = HttpParser::new(client_stream, Role::Client);
        let mut server = HttpParser::new(server_stream, Role::Server);

        let body: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        client.send_method_line("PUT", "/data", "HTTP/1.1").await.unwrap();
        client
            .send_headers(&pairs(&[
                ("Host", "h"),
                ("Content-Length", &size.to_string()),
            ]))
            .await
            .unwrap();
        if !body.is_empty() {
            client.send_body(&body).await.unwrap();
        }
        client.send_body(b"").await.unwrap();

        server.recv_method_line().await.unwrap();
        server.recv_headers().await.unwrap();
        assert_eq!(drain_body(&mut server).await, body, "size {}", size);
    }
}

#[tokio::test]
async fn chunked_bodies_roundtrip_with_arbitrary_chunk_sizes() {
    let (client_stream, server_stream) = NetworkStream::pair(256 * 1024);
    let mut client = HttpParser::new(client_stream, Role::Client);
    let mut server = HttpParser::new(server_stream, Role::Server);

    client.send_method_line("POST", "/up", "HTTP/1.1").await.unwrap();
    client
        .send_headers(&pairs(&[("Host", "h"), ("Transfer-Encoding", "chunked")]))
        .await
        .unwrap();

    let mut sent = Vec::new();
    for chunk_size in [1usize, 3, 7, 4096, 5] {
        let chunk: Vec<u8> = (0..chunk_size).map(|i| (i % 13) as u8 + b'a').collect();
        sent.extend_from_slice(&chunk);
        client.send_body(&chunk).await.unwrap();
    }
    client.send_body(b"").await.unwrap();

    server.recv_method_line().await.unwrap();
    server.recv_headers().await.unwrap();
    assert_eq!(drain_body(&mut server).await, sent);
}

#[tokio::test]
async fn full_cycle_returns_both_parsers_to_idle() {
    let (client_stream, server_stream) = NetworkStream::pair(64 * 1024);
    let mut client = HttpParser::new(client_stream, Role::Client);
    let mut server = HttpParser::new(server_stream, Role::Server);

    client.send_method_line("GET", "/", "HTTP/1.1").await.unwrap();
    client.send_headers(&pairs(&[("Host", "h")])).await.unwrap();
    client.send_body(b"").await.unwrap();

    server.recv_method_line().await.unwrap();
    server.recv_headers().await.unwrap();
    assert!(server.recv_body().await.unwrap().is_empty());

    server.send_status_line("HTTP/1.1", 200, "OK").await.unwrap();
    server
        .send_headers(&pairs(&[("Content-Length", "2")]))
        .await
        .unwrap();
    server.send_body(b"ok").await.unwrap();
    server.send_body(b"").await.unwrap();

    let (_, code, _) = client.recv_status_line().await.unwrap();
    assert_eq!(code, 200);
    client.recv_headers().await.unwrap();
    assert_eq!(drain_body(&mut client).await, b"ok");

    client.complete().await;
    server.complete().await;
    assert!(client.is_idle());
    assert!(server.is_idle());
    assert_eq!(client.send_state(), State::SendMethodLine);
    assert_eq!(server.recv_state(), State::RecvMethodLine);
}

#[tokio::test]
async fn chunked_upload_terminator_wire_bytes() {
    use tokio::io::AsyncReadExt;

    let (client_stream, mut peer) = NetworkStream::pair(64 * 1024);
    let mut client = HttpParser::new(client_stream, Role::Client);
    client.send_method_line("POST", "/", "HTTP/1.1").await.unwrap();
    client
        .send_headers(&pairs(&[("Host", "h"), ("Transfer-Encoding", "chunked")]))
        .await
        .unwrap();
    client.send_body(b"hello").await.unwrap();
    client.send_body(b"").await.unwrap();

    let head = b"POST / HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n";
    let mut wire = vec![0u8; head.len() + 15];
    let mut total = 0;
    while total < wire.len() {
        let n = peer.read(&mut wire[total..]).await.unwrap();
        assert_ne!(n, 0);
        total += n;
    }
    assert_eq!(&wire[..head.len()], head);
    assert_eq!(&wire[head.len()..], b"5\r\nhello\r\n0\r\n\r\n");
}

#[tokio::test]
async fn interim_1xx_blocks_then_final_response() {
    use tokio::io::AsyncWriteExt;

    let (client_stream, mut peer) = NetworkStream::pair(64 * 1024);
    let mut client = HttpParser::new(client_stream, Role::Client);
    client.send_method_line("GET", "/", "HTTP/1.1").await.unwrap();
    client.send_headers(&pairs(&[("Host", "h")])).await.unwrap();
    client.send_body(b"").await.unwrap();

    peer.write_all(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();

    let mut status_lines = 0;
    loop {
        let (_, code, _) = client.recv_status_line().await.unwrap();
        status_lines += 1;
        client.recv_headers().await.unwrap();
        if code >= 200 {
            break;
        }
        assert_eq!(client.recv_state(), State::RecvStatusLine);
    }
    assert_eq!(status_lines, 2);
    assert_eq!(client.recv_state(), State::RecvBody);
    assert!(client.recv_body().await.unwrap().is_empty());
}
