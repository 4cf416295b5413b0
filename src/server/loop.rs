// Server loop module
// Accepts connections until the shutdown future resolves

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept loop.
///
/// Must run inside a `tokio::task::LocalSet`: connections are served with
/// `spawn_local`. Returns once `shutdown` resolves; connections still in
/// flight finish on the `LocalSet` as long as it keeps being driven.
pub async fn start_server_loop<S>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future<Output = &'static str>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            reason = &mut shutdown => {
                logger::log_shutdown(reason, state.router.bridge().in_flight());
                drop(listener);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::bridge::BlockingBridge;
    use crate::config::Config;
    use crate::handler::Router;
    use crate::store::MemoryStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn send_raw(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        // The server may reset after closing; keep whatever was read
        let _ = stream.read_to_end(&mut response).await;
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let mut config = Config::load_from("/nonexistent/offload-dispatch-config").unwrap();
        config.logging.access_log = true;
        config.http.max_body_size = 64;

        let store = Arc::new(
            MemoryStore::from_toml(
                r#"
                [[authors]]
                id = 42
                first_name = "Italo"
                last_name = "Calvino"
                nationality = "italian"
                "#,
            )
            .unwrap(),
        );
        let mut router = Router::new(store, BlockingBridge::current())
            .with_max_body_size(config.http.max_body_size);
        api::register_routes(&mut router, &config.routes).unwrap();
        let state = Arc::new(AppState::new(config, router));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    state,
                    async move {
                        let _ = stop_rx.await;
                        "test"
                    },
                ));

                let ok = send_raw(
                    addr,
                    "GET /authorById/42 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(ok.starts_with("HTTP/1.1 200 OK"), "{ok}");
                assert!(ok.contains("content-type: text/json"));
                assert!(ok.contains("server: Offload-Dispatch/0.1"));
                assert!(ok.contains("\"last_name\":\"Calvino\""));

                let missing = send_raw(
                    addr,
                    "GET /authorById/999 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(missing.starts_with("HTTP/1.1 404 Not Found"), "{missing}");
                assert!(missing.contains("/authorById/999"));

                let body = "x".repeat(100);
                let request = format!(
                    "PUT /addNewAuthor HTTP/1.1\r\n\
                     Host: test\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                );
                let too_large = send_raw(addr, &request).await;
                assert!(too_large.starts_with("HTTP/1.1 413"), "{too_large}");

                stop_tx.send(()).unwrap();
                assert!(server.await.unwrap().is_ok());
            })
            .await;
    }
}
