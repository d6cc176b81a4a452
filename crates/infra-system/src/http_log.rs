// Logging wrapper around outbound HTTP requests
// reason: reqwest as the HTTP client (same client the CLI uses)

use reqwest::{Client, Request, Response};
use std::time::Instant;

use sysdebug_core::logging::{info_or_error, Attr};
use sysdebug_core::port::Logger;

/// Sends `request` through `client` and logs the round trip
///
/// Logged as `HTTPRequest` with duration, method and url, plus
/// contentLength (-1 when unknown), status and statusCode when a response
/// was received. The response or error is returned unchanged.
pub async fn log_http_request(
    logger: &dyn Logger,
    client: &Client,
    request: Request,
) -> reqwest::Result<Response> {
    let method = request.method().to_string();
    let url = request.url().to_string();

    let start = Instant::now();
    let result = client.execute(request).await;

    let mut attrs = vec![
        Attr::duration("duration", start.elapsed()),
        Attr::string("method", method),
        Attr::string("url", url),
    ];
    if let Ok(response) = &result {
        let content_length = response
            .content_length()
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(-1);
        attrs.push(Attr::int("contentLength", content_length));
        attrs.push(Attr::string("status", response.status().to_string()));
        attrs.push(Attr::int("statusCode", response.status().as_u16()));
    }
    info_or_error(logger, "HTTPRequest", result.as_ref().err(), attrs);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdebug_core::logging::{Level, Value};
    use sysdebug_core::port::logger::mocks::MemoryLogger;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Serves a single canned HTTP response
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/config.toml", addr)
    }

    #[tokio::test]
    async fn test_logs_response() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        )
        .await;
        let logger = MemoryLogger::new();
        let client = local_client();
        let request = client.get(&url).build().unwrap();

        let response = log_http_request(&logger, &client, request).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let record = logger.last().unwrap();
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.message, "HTTPRequest");
        assert_eq!(
            record.keys(),
            vec!["duration", "method", "url", "contentLength", "status", "statusCode"]
        );
        assert_eq!(record.get("method"), Some(&Value::Str("GET".to_string())));
        assert_eq!(record.get("url"), Some(&Value::Str(url)));
        assert_eq!(record.get("contentLength"), Some(&Value::Int(9)));
        assert_eq!(record.get("status"), Some(&Value::Str("404 Not Found".to_string())));
        assert_eq!(record.get("statusCode"), Some(&Value::Int(404)));
    }

    #[tokio::test]
    async fn test_logs_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let logger = MemoryLogger::new();
        let client = local_client();
        let request = client.get(format!("http://{}/", addr)).build().unwrap();

        assert!(log_http_request(&logger, &client, request).await.is_err());

        let record = logger.last().unwrap();
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.keys(), vec!["duration", "method", "url", "err"]);
    }
}
