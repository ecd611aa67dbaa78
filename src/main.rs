mod config;
mod db;
mod error;
mod models;
mod realtime;
mod routes;
mod services;
mod state;
mod storage;
mod store;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env();
    let port = config.port;

    let state = state::AppState::init(config)
        .await
        .expect("app state init failed");

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "mindbridge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server failed");
}

/// Wait for Ctrl-C, then end realtime streams so open websockets drain.
async fn shutdown_signal(state: state::AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
    state.shutdown();
}
