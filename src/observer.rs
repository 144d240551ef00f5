use std::net::SocketAddr;

use codec::codes::Dotted;
use service::ProxyHandler;

use crate::statistics::{Statistics, Stats};

/// Turns proxy events into log lines and statistics updates.
#[derive(Clone)]
pub struct Observer {
    statistics: Statistics,
}

impl Observer {
    pub fn new(statistics: Statistics) -> Self {
        Self { statistics }
    }
}

impl ProxyHandler for Observer {
    fn on_forward(&self, client: &SocketAddr, origin: &SocketAddr) {
        log::info!("forward: client={client:?}, origin={origin:?}");

        self.statistics.add(&[Stats::ForwardedPkts(1)]);
    }

    fn on_dispatch(&self, client: &SocketAddr, code: u8) {
        log::debug!("dispatch: client={client:?}, code={}", Dotted(code));
    }

    fn on_cache_hit(&self, client: &SocketAddr) {
        log::info!("cache hit: client={client:?}");

        self.statistics.add(&[Stats::CacheHits(1)]);
    }

    fn on_revalidated(&self, client: &SocketAddr) {
        log::info!("revalidated: client={client:?}");

        self.statistics.add(&[Stats::CacheHits(1)]);
    }

    fn on_rejected(&self, client: &SocketAddr, code: u8) {
        log::info!("reject: client={client:?}, code={}", Dotted(code));

        self.statistics.add(&[Stats::ErrorPkts(1)]);
    }

    fn on_duplicate(&self, client: &SocketAddr) {
        log::debug!("request already in flight, ignore: client={client:?}");
    }

    fn on_expired(&self, client: &SocketAddr) {
        log::info!("request expired: client={client:?}");
    }

    fn on_reset(&self, client: &SocketAddr) {
        log::debug!("exchange reset by origin: client={client:?}");
    }
}
