pub mod cache;
pub mod exchange;
pub mod resolver;
pub mod rewrite;
pub mod routing;

use crate::{
    cache::{CacheOptions, ResponseCache},
    exchange::{ExchangeManager, ExchangeManagerOptions},
    routing::Router,
};

use std::{net::SocketAddr, sync::Arc};

use parking_lot::Mutex;

/// Proxy event callbacks.
///
/// The service crate emits no log lines of its own; everything a
/// deployment wants to know about an exchange flows through this trait.
/// All methods default to doing nothing.
pub trait ProxyHandler: Send + Sync {
    /// A rewritten request went out towards an origin server.
    #[allow(unused_variables)]
    fn on_forward(&self, client: &SocketAddr, origin: &SocketAddr) {}

    /// An origin response was dispatched to its client.
    #[allow(unused_variables)]
    fn on_dispatch(&self, client: &SocketAddr, code: u8) {}

    /// A fresh cache entry answered a request without an upstream send.
    #[allow(unused_variables)]
    fn on_cache_hit(&self, client: &SocketAddr) {}

    /// A 2.03 Valid from the origin extended a cache entry's freshness and
    /// the cached representation was dispatched to the client.
    #[allow(unused_variables)]
    fn on_revalidated(&self, client: &SocketAddr) {}

    /// A request was answered with a proxy-generated error code.
    #[allow(unused_variables)]
    fn on_rejected(&self, client: &SocketAddr, code: u8) {}

    /// A retransmission of an exchange already in flight was suppressed.
    #[allow(unused_variables)]
    fn on_duplicate(&self, client: &SocketAddr) {}

    /// An upstream exchange expired unanswered; its client gets nothing
    /// and is expected to retransmit.
    #[allow(unused_variables)]
    fn on_expired(&self, client: &SocketAddr) {}

    /// The origin reset an upstream exchange.
    #[allow(unused_variables)]
    fn on_reset(&self, client: &SocketAddr) {}
}

pub struct ServiceOptions<T> {
    /// Capacity of the outbound scratch buffer.
    pub pdu_buffer_size: usize,
    /// Number of concurrent in-flight proxied requests.
    pub max_requests_waiting: usize,
    /// Seconds before an unanswered upstream exchange is dropped.
    pub request_timeout: u64,
    /// Registered network interface ids; zone-ids in Proxy-Uri must name
    /// one of these, and a single entry is selected implicitly.
    pub interfaces: Vec<u32>,
    /// Response cache configuration. `None` elides every cache
    /// interaction and responses are relayed verbatim.
    pub cache: Option<CacheOptions>,
    pub handler: T,
}

/// CoAP forward proxy service.
#[derive(Clone)]
pub struct Service<T> {
    manager: Arc<ExchangeManager<T>>,
    cache: Option<Arc<Mutex<ResponseCache>>>,
    interfaces: Arc<Vec<u32>>,
    pdu_buffer_size: usize,
    handler: T,
}

impl<T> Service<T>
where
    T: ProxyHandler + Clone + 'static,
{
    /// Create the proxy service.
    pub fn new(options: ServiceOptions<T>) -> Self {
        Self {
            manager: ExchangeManager::new(ExchangeManagerOptions {
                capacity: options.max_requests_waiting,
                request_timeout: options.request_timeout,
                handler: options.handler.clone(),
            }),
            cache: options
                .cache
                .map(|options| Arc::new(Mutex::new(ResponseCache::new(options)))),
            interfaces: Arc::new(options.interfaces),
            pdu_buffer_size: options.pdu_buffer_size,
            handler: options.handler,
        }
    }

    /// Get a packet router for one dispatch context.
    pub fn get_router(&self) -> Router<T> {
        Router::new(self)
    }

    pub fn get_exchange_manager(&self) -> &ExchangeManager<T> {
        &self.manager
    }
}
