use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{ConnectInfo, State, WebSocketUpgrade},
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        services::{ServeDir, ServeFile},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use pairlink_config::PairlinkConfig;

use crate::{state::GatewayState, ws::handle_connection};

/// Reason carried by the `server-shutdown` notice.
pub const SHUTDOWN_REASON: &str = "Server is shutting down";

/// How long to wait for open connections to flush after shutdown starts.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
///
/// With a `public_dir`, `/`, `/server` and `/client` serve the three pages
/// and anything else falls through to the directory.
pub fn build_gateway_app(state: Arc<GatewayState>, public_dir: Option<&Path>) -> Router {
    let app_state = AppState { gateway: state };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler));

    if let Some(dir) = public_dir {
        router = router
            .route_service("/", ServeFile::new(dir.join("index.html")))
            .route_service("/server", ServeFile::new(dir.join("server.html")))
            .route_service("/client", ServeFile::new(dir.join("client.html")))
            .fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve on an already bound listener until the state's shutdown token fires.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<GatewayState>,
    public_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let app = build_gateway_app(Arc::clone(&state), public_dir);
    let shutdown = state.shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}

/// Start the gateway HTTP + WebSocket server.
pub async fn start_gateway(config: &PairlinkConfig) -> anyhow::Result<()> {
    let state = GatewayState::new(&config.session);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local_addr = listener.local_addr()?;

    let public_dir = config.server.public_dir.as_deref();
    if let Some(dir) = public_dir
        && !dir.is_dir()
    {
        warn!(dir = %dir.display(), "public_dir does not exist, pages will 404");
    }

    // Startup banner.
    let lines = [
        format!("pairlink gateway v{}", state.version),
        format!(
            "protocol v{}, listening on {}",
            pairlink_protocol::PROTOCOL_VERSION,
            local_addr
        ),
        format!("session code: {}", state.current_code().await),
        match public_dir {
            Some(dir) => format!("pages: {}", dir.display()),
            None => "pages: disabled".to_string(),
        },
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    let signal_state = Arc::clone(&state);
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_state.begin_shutdown(SHUTDOWN_REASON).await;
    });

    serve_on(listener, Arc::clone(&state), public_dir).await?;
    drain_connections(&state, CONNECTION_DRAIN_TIMEOUT).await;
    info!("gateway stopped");
    Ok(())
}

/// Wait for Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Give connection tasks a bounded window to flush their close frames.
async fn drain_connections(state: &GatewayState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while state.client_count().await > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let remaining = state.client_count().await;
    if remaining > 0 {
        warn!(remaining, "connections still open at exit");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.gateway.client_count().await;
    let (occupants, monitor_attached) = {
        let lifecycle = state.gateway.lifecycle.lock().await;
        (
            lifecycle.session().occupant_count(),
            lifecycle.session().monitor().is_some(),
        )
    };
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "protocol": pairlink_protocol::PROTOCOL_VERSION,
        "connections": connections,
        "occupants": occupants,
        "monitorAttached": monitor_attached,
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state.gateway, addr))
}
