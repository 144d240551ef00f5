pub mod config;
pub mod observer;
pub mod server;
pub mod statistics;

use std::sync::Arc;

use service::{Service, ServiceOptions, cache::CacheOptions};

use self::{config::Config, observer::Observer, statistics::Statistics};

/// In order to let the integration test directly use the coap-proxy crate
/// and start the server, a function is opened to replace the main function
/// to directly start the server.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let statistics = Statistics::default();
    let service = Service::new(ServiceOptions {
        pdu_buffer_size: config.proxy.pdu_buffer_size,
        max_requests_waiting: config.proxy.max_requests_waiting,
        request_timeout: config.proxy.request_timeout,
        interfaces: config.proxy.interfaces.clone(),
        cache: config.cache.enabled.then(|| CacheOptions {
            capacity: config.cache.capacity,
        }),
        handler: Observer::new(statistics.clone()),
    });

    server::run(config, &statistics, &service).await?;

    // The proxy is non-blocking after it runs and needs to be kept from
    // exiting immediately.
    std::future::pending::<()>().await;

    Ok(())
}
