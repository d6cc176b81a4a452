//! Process and HTTP logging wrappers against real processes and a local server

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::process::Command;

use sysdebug_core::error::SystemError;
use sysdebug_core::logging::{Level, Value};
use sysdebug_core::port::logger::mocks::MemoryLogger;
use sysdebug_infra_system::{
    log_cmd_combined_output, log_cmd_output, log_cmd_run, log_cmd_start, log_cmd_wait,
    log_http_request,
};

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[tokio::test]
async fn test_start_wait_records() {
    let logger = MemoryLogger::new();
    let mut cmd = sh("exit 3");
    cmd.env("SYSDEBUG_TEST", "1");

    let mut child = log_cmd_start(&logger, &mut cmd).unwrap();
    let err = log_cmd_wait(&logger, &cmd, &mut child).await.unwrap_err();
    assert!(matches!(err, SystemError::ProcessExit(_)));

    let records = logger.records();
    assert_eq!(records[0].message, "Start");
    assert_eq!(records[0].level, Level::Info);
    assert_eq!(
        records[0].get("cmd").map(|v| v.to_string()),
        Some(r#"{path="sh" args=["-c" "exit 3"] env=["SYSDEBUG_TEST=1"]}"#.to_string())
    );
    assert_eq!(records[1].message, "Wait");
    assert_eq!(records[1].level, Level::Error);
    assert_eq!(records[1].get("exitCode"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn test_output_and_combined_output() {
    let logger = MemoryLogger::new();

    let stdout = log_cmd_output(&logger, &mut sh("echo out; echo err >&2"))
        .await
        .unwrap();
    assert_eq!(stdout, b"out\n");

    let combined = log_cmd_combined_output(&logger, &mut sh("echo out; echo err >&2"))
        .await
        .unwrap();
    assert_eq!(combined.len(), 8);

    let records = logger.records();
    assert_eq!(records[0].get("output"), Some(&Value::Bytes(b"out\n".to_vec())));
    assert_eq!(records[0].get("size"), Some(&Value::Int(4)));
    assert_eq!(records[1].message, "CombinedOutput");
    assert_eq!(records[1].get("size"), Some(&Value::Int(8)));
}

#[tokio::test]
async fn test_run_missing_program() {
    let logger = MemoryLogger::new();

    let err = log_cmd_run(&logger, &mut Command::new("sysdebug-no-such-program"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Not a process exit: a single err attribute instead of exit status
    let record = logger.last().unwrap();
    assert_eq!(record.message, "Run");
    assert_eq!(record.keys(), vec!["cmd", "duration", "err"]);
}

#[tokio::test]
async fn test_http_request_record() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let logger = MemoryLogger::new();
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let request = client
        .post(format!("http://{}/upload", addr))
        .body("payload")
        .build()
        .unwrap();

    let response = log_http_request(&logger, &client, request).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "ok");

    let record = logger.last().unwrap();
    assert_eq!(record.message, "HTTPRequest");
    assert_eq!(record.get("method"), Some(&Value::Str("POST".to_string())));
    assert_eq!(record.get("status"), Some(&Value::Str("200 OK".to_string())));
    assert_eq!(record.get("statusCode"), Some(&Value::Int(200)));
    assert_eq!(record.get("contentLength"), Some(&Value::Int(2)));
}
