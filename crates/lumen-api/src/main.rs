use lumen_core::Config;

// mimalloc keeps fragmentation low under many concurrent decode buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    lumen_api::telemetry::init_telemetry(config.log_format)?;

    let (state, router) = lumen_api::setup::initialize_app(config.clone()).await?;

    lumen_api::setup::server::start_server(&config, router).await?;

    state.ingest.shutdown().await;
    tracing::info!("Ingestion queue drained");

    Ok(())
}
