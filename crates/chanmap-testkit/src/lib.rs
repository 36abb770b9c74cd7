//! Chanmap Testkit - mock channel mapping device
//!
//! Serves an in-memory device over the channel mapping HTTP API so the
//! conformance suite can be run and tested without hardware.

pub mod api;
pub mod device;
pub mod fixtures;

pub use device::{Device, DeviceError, InputDef, OutputDef, Quirks};

use axum::routing::{delete, get};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

/// Path prefix of the channel mapping API
pub const API_ROOT: &str = "/x-nmos/channelmapping/v1.0";

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub device: Arc<Mutex<Device>>,
}

impl AppState {
    pub fn new(device: Device) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
        }
    }

    /// Lock the device. A panicked handler leaves the state usable.
    pub fn device(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    let map = Router::new()
        .route("/", get(api::map_root))
        .route("/inputs", get(api::list_inputs))
        .route("/inputs/{id}", get(api::input_root))
        .route("/inputs/{id}/{resource}", get(api::input_resource))
        .route("/outputs", get(api::list_outputs))
        .route("/outputs/{id}", get(api::output_root))
        .route("/outputs/{id}/{resource}", get(api::output_resource))
        .route("/io", get(api::get_io))
        .route("/active", get(api::get_active))
        .route("/active/{id}", get(api::get_active_output))
        .route(
            "/activations",
            get(api::list_activations).post(api::post_activation),
        )
        .route("/activations/{id}", delete(api::delete_activation));

    Router::new()
        .nest(&format!("{API_ROOT}/map"), map)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `addr` until the process ends
pub async fn start_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Mock channel mapping device listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// A device served on an ephemeral localhost port from its own thread.
///
/// Dropping the handle shuts the server down and joins the thread.
pub struct MockDevice {
    addr: SocketAddr,
    state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockDevice {
    pub fn spawn(device: Device) -> anyhow::Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let state = AppState::new(device);
        let app = build_router(state.clone());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (shutdown, stop) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            runtime.block_on(async move {
                let listener = match TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!("Mock device failed to listen: {}", e);
                        return;
                    }
                };
                let shutdown = async {
                    let _ = stop.await;
                };
                if let Err(e) = axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    tracing::error!("Mock device error: {}", e);
                }
            });
        });

        tracing::debug!(%addr, "Mock device started");
        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the API, with trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}{}/", self.addr, API_ROOT)
    }

    /// The live device, for inspecting or adjusting state between requests
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
