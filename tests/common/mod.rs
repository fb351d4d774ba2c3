//! Shared utilities for integration testing.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use gatehouse::config::Config;
use gatehouse::db::Store;
use gatehouse::http::HttpServer;
use gatehouse::lifecycle::Shutdown;

/// Start the service on an ephemeral port with a fresh in-memory database.
///
/// Returns the bound address and the shutdown handle; dropping the handle
/// does not stop the server, call `trigger` at the end of the test.
pub async fn spawn_server(mutate: impl FnOnce(&mut Config)) -> (SocketAddr, Shutdown) {
    let store = Store::connect_in_memory().await.unwrap();
    store.migrate().await.unwrap();

    let mut config = Config::default();
    mutate(&mut config);

    let server = HttpServer::new(config, store).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

#[allow(dead_code)]
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}
