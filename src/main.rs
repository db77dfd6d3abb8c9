mod app;

use anyhow::Result;

use crate::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    terrawatch_core::init()?;

    let mut app = App::new()?;
    app.initialize().await?;

    let stats = app.cache().stats();
    tracing::info!(
        "Terrawatch started: {}/{} locations cached",
        stats.count,
        app.config().cities.len()
    );
    tracing::debug!("Cache stats: {}", serde_json::to_string(&stats)?);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");

    app.shutdown().await?;

    let stats = app.cache().stats();
    tracing::info!(
        cycles = app.cache().scheduler().cycles_completed(),
        refreshing = app.is_refreshing(),
        stale = stats.stale_keys.len(),
        "Terrawatch stopped"
    );

    Ok(())
}
