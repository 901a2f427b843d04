use anyhow::Context;
use clap::Parser;
use sitekit_server::{
    router,
    seed::{apply_seed, load_seed},
    telemetry::init_tracing,
    AppState, Args, ServerConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?
        .with_args(&args);

    init_tracing(&config.log_filter);

    let state = AppState::new(config);
    if let Some(path) = &state.config.seed_file {
        let seed = load_seed(path)?;
        apply_seed(&state, seed)?;
    }

    let listener = tokio::net::TcpListener::bind(&state.config.bind)
        .await
        .with_context(|| format!("binding {}", state.config.bind))?;
    tracing::info!(
        addr = %state.config.bind,
        root_domain = %state.config.root_domain,
        "sitekit server listening"
    );

    let app = router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
