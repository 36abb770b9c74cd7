//! Standalone mock device for manual runs of the suite
//!
//! Serves the standard fixture on `127.0.0.1:$PORT` (default 8080). Set
//! `FIXTURE` to `unconstrained` or `re_entrant_loop` for the other layouts.

use chanmap_testkit::{fixtures, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080u16);

    let fixture = std::env::var("FIXTURE").unwrap_or_else(|_| "standard".to_string());
    let device = match fixture.as_str() {
        "unconstrained" => fixtures::unconstrained(),
        "re_entrant_loop" => fixtures::re_entrant_loop(),
        "no_unroute" => fixtures::no_unroute(),
        "pinned_output" => fixtures::pinned_output(),
        _ => fixtures::standard(),
    };

    tracing::info!(port, %fixture, "Mock device starting");

    let addr = format!("127.0.0.1:{port}");
    if let Err(e) = chanmap_testkit::start_server(AppState::new(device), &addr).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
