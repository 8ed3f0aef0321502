//! Shared helpers: boot the demo app on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use guiapi::api;
use guiapi::app_state::AppState;
use guiapi::config::GuiConfig;
use guiapi::demo::{self, ReportOptions};

/// Upper bound for any single wait in the integration tests.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A running test server.
pub struct TestApp {
    /// Bound address.
    pub addr: SocketAddr,
    /// Root token; cancelling it drains the server.
    pub shutdown: CancellationToken,
}

impl TestApp {
    /// Absolute HTTP URL for `path`.
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Absolute WebSocket URL of the update stream.
    pub fn ws(&self) -> String {
        format!("ws://{}/guiapi/ws", self.addr)
    }
}

/// Boots the demo registry with short report timings.
pub async fn spawn_app() -> TestApp {
    let options = ReportOptions {
        run_time: Duration::from_millis(100),
        refresh_delay: Duration::ZERO,
    };
    let Ok(registry) = demo::build_registry(options) else {
        panic!("demo registry failed");
    };
    let shutdown = CancellationToken::new();
    let Ok(app) = api::build_app(
        AppState::new(registry, shutdown.clone()),
        &GuiConfig::default(),
    ) else {
        panic!("demo routes collide");
    };

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await;
    });

    TestApp { addr, shutdown }
}
