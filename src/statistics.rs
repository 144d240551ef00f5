use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// The type of information passed to the statistics.
#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedPkts(usize),
    SendPkts(usize),
    ForwardedPkts(usize),
    CacheHits(usize),
    ErrorPkts(usize),
}

#[derive(Default)]
pub struct Count(AtomicUsize);

impl Count {
    pub fn add(&self, value: usize) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide packet counters.
pub struct Counts {
    pub received_pkts: Count,
    pub send_pkts: Count,
    pub forwarded_pkts: Count,
    pub cache_hits: Count,
    pub error_pkts: Count,
}

impl Default for Counts {
    fn default() -> Self {
        Self {
            received_pkts: Count::default(),
            send_pkts: Count::default(),
            forwarded_pkts: Count::default(),
            cache_hits: Count::default(),
            error_pkts: Count::default(),
        }
    }
}

impl Counts {
    /// # Example
    ///
    /// ```
    /// use coap_proxy::statistics::*;
    ///
    /// let counts = Counts::default();
    ///
    /// counts.add(&Stats::ReceivedPkts(1));
    /// assert_eq!(counts.received_pkts.get(), 1);
    ///
    /// counts.add(&Stats::CacheHits(1));
    /// assert_eq!(counts.cache_hits.get(), 1);
    /// ```
    pub fn add(&self, payload: &Stats) {
        match payload {
            Stats::ReceivedPkts(v) => self.received_pkts.add(*v),
            Stats::SendPkts(v) => self.send_pkts.add(*v),
            Stats::ForwardedPkts(v) => self.forwarded_pkts.add(*v),
            Stats::CacheHits(v) => self.cache_hits.add(*v),
            Stats::ErrorPkts(v) => self.error_pkts.add(*v),
        }
    }
}

/// Shared statistics handle.
///
/// Cloned into the dispatch task and the observer; updates are plain
/// relaxed counters.
///
/// # Example
///
/// ```
/// use coap_proxy::statistics::*;
///
/// let statistics = Statistics::default();
/// statistics.add(&[Stats::ReceivedPkts(1), Stats::SendPkts(1)]);
///
/// assert_eq!(statistics.get().received_pkts.get(), 1);
/// assert_eq!(statistics.get().send_pkts.get(), 1);
/// ```
#[derive(Default, Clone)]
pub struct Statistics(Arc<Counts>);

impl Statistics {
    pub fn add(&self, reports: &[Stats]) {
        for report in reports {
            self.0.add(report);
        }
    }

    pub fn get(&self) -> &Counts {
        &self.0
    }
}
