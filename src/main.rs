use std::sync::Arc;
use tourbook_api::{app, config, db, events, handlers::AppServices, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    let db = Arc::new(db::establish_connection_from_app_config(&app_config).await?);
    if app_config.auto_migrate {
        db::run_migrations(&db).await?;
        info!("database migrations applied");
    }

    let (event_sender, event_rx) = events::channel(1024);
    tokio::spawn(events::process_events(event_rx));

    let services = AppServices::new(db.clone(), &app_config, Some(Arc::new(event_sender)))?;
    let state = AppState {
        db,
        config: app_config.clone(),
        services,
    };

    let addr = format!("{}:{}", app_config.host, app_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, environment = %app_config.environment, "tourbook-api listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
