//! Requests over real TCP connections through the access log middleware.

use http::header::CONTENT_LENGTH;
use http::{HeaderValue, StatusCode};
use http_body_util::BodyExt;
use httplog_core::MemorySink;
use httplog_middleware::{AccessLogConfig, AccessLogMiddleware, FnHandler, Handler};
use httplog_server::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn start<H: Handler>(handler: H) -> (SocketAddr, oneshot::Sender<()>) {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve_with_shutdown(handler, async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });
    (addr, stop_tx)
}

async fn send(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

fn middleware() -> (MemorySink, AccessLogMiddleware) {
    let sink = MemorySink::new();
    let middleware = AccessLogConfig::builder()
        .service("echo")
        .host("node-1")
        .redact(["token"])
        .sink(Arc::new(sink.clone()))
        .build()
        .unwrap();
    (sink, middleware)
}

#[tokio::test]
async fn test_echo_is_logged_with_connection_details() {
    let (sink, middleware) = middleware();
    let handler = middleware.wrap(FnHandler::new(|_ctx, request, writer| {
        Box::pin(async move {
            let body = request.into_body().collect().await.unwrap().to_bytes();
            writer.write_status(StatusCode::CREATED);
            writer
                .headers_mut()
                .insert(CONTENT_LENGTH, body.len().into());
            writer.write_all(&body).unwrap();
        })
    }));
    let (addr, stop) = start(handler).await;

    let response = send(
        addr,
        "POST /echo?token=secret&q=1 HTTP/1.1\r\n\
         Host: echo.test\r\n\
         Content-Length: 5\r\n\
         Connection: close\r\n\
         \r\n\
         hello",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 201 Created\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nhello"), "{response}");

    let records = sink.with_schema("access");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.u64_field("status"), Some(201));
    assert_eq!(record.u64_field("bytes_in"), Some(5));
    assert_eq!(record.u64_field("bytes_out"), Some(5));
    assert_eq!(record.str_field("src_ip"), Some("127.0.0.1"));
    assert_eq!(record.str_field("dest_ip"), Some("127.0.0.1"));
    assert_eq!(record.u64_field("port"), Some(u64::from(addr.port())));
    assert_eq!(record.str_field("site"), Some("echo.test"));
    assert_eq!(record.str_field("uri_query"), Some("token=REDACTED&q=1"));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_panicking_handler_gets_500_and_no_record() {
    let (sink, middleware) = middleware();
    let handler = middleware.wrap(FnHandler::new(|_ctx, _request, _writer| {
        Box::pin(async move {
            panic!("handler failure");
        })
    }));
    let (addr, stop) = start(handler).await;

    let response = send(
        addr,
        "GET /boom HTTP/1.1\r\nHost: echo.test\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(
        response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"),
        "{response}"
    );
    assert!(sink.with_schema("access").is_empty());

    let _ = stop.send(());
}

#[tokio::test]
async fn test_capabilities_survive_the_middleware() {
    let (sink, middleware) = middleware();
    let handler = middleware.wrap(FnHandler::new(|_ctx, _request, writer| {
        Box::pin(async move {
            let caps = writer.capabilities();
            let report = format!(
                "flush={} close_notify={} upgrade={}",
                caps.flush, caps.close_notify, caps.upgrade
            );
            writer
                .headers_mut()
                .insert(CONTENT_LENGTH, report.len().into());
            writer.write_all(report.as_bytes()).unwrap();
            writer.flusher().unwrap().flush().unwrap();
        })
    }));
    let (addr, stop) = start(handler).await;

    let response = send(
        addr,
        "GET /caps HTTP/1.1\r\nHost: echo.test\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(
        response.ends_with("flush=true close_notify=true upgrade=false"),
        "{response}"
    );
    let record = &sink.with_schema("access")[0];
    assert_eq!(record.u64_field("status"), Some(200));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_keep_alive_logs_each_request() {
    let (sink, middleware) = middleware();
    let handler = middleware.wrap(FnHandler::new(|_ctx, _request, writer| {
        Box::pin(async move {
            writer.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(2_usize));
            writer.write_all(b"ok").unwrap();
        })
    }));
    let (addr, stop) = start(handler).await;

    let response = send(
        addr,
        "GET /one HTTP/1.1\r\nHost: a\r\n\r\n\
         GET /two HTTP/1.1\r\nHost: a\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2, "{response}");
    let paths: Vec<_> = sink
        .with_schema("access")
        .iter()
        .map(|r| r.str_field("uri_path").unwrap().to_string())
        .collect();
    assert_eq!(paths, ["/one", "/two"]);

    let _ = stop.send(());
}
