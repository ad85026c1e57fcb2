use anyhow::{Context, Result};
use hearth_web::{create_app, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_web=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = settings::Settings::load().context("Failed to load settings")?;
    info!(%settings, "settings loaded");

    let store = hearth_store::Store::open(&settings.database.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            settings.database.path.display()
        )
    })?;

    let state = AppState::new(&settings, store)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.http.bind, settings.http.port
    ))
    .await
    .with_context(|| {
        format!(
            "Failed to bind to {}:{}",
            settings.http.bind, settings.http.port
        )
    })?;

    info!(
        "Server starting on http://{}:{}",
        settings.http.bind, settings.http.port
    );

    axum::serve(listener, app)
        .await
        .context("Server failed to start")?;

    Ok(())
}
