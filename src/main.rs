#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use coap_proxy::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    if config.proxy.interfaces.is_empty() {
        log::warn!(
            "No interfaces are registered, zone-ids and link-local origins will be rejected."
        );
    }

    coap_proxy::startup(config).await
}
