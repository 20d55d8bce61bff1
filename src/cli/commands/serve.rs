use crate::cli::open_state;
use crate::server::serve;

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let state = open_state().await?;
    let port = port.unwrap_or(state.config.server.port);
    tracing::info!("Starting dyntables in {:?} mode", state.config.environment);
    serve(state, port).await
}
