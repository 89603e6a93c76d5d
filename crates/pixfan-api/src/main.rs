use pixfan_core::Config;

// mimalloc holds up better than the musl allocator under concurrent
// transcodes in containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = pixfan_api::setup::initialize_app(config.clone()).await?;

    pixfan_api::setup::server::start_server(&config, router, state).await?;

    Ok(())
}
