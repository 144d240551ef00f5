use crate::{
    ProxyHandler,
    cache::{CACHE_KEY_LENGTH, CacheKey},
};

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use ahash::{HashMap, HashMapExt};
use codec::message::Token;
use parking_lot::Mutex;

/// A specially optimised timer.
///
/// This timer does not advance automatically and needs to be advanced
/// externally and manually; the exchange manager's background thread
/// advances it once per second. All freshness and expiry deadlines in the
/// proxy are absolute values of this timer.
///
/// ```
/// use coap_proxy_service::exchange::Timer;
///
/// let timer = Timer::default();
///
/// assert_eq!(timer.get(), 0);
/// assert_eq!(timer.add(), 1);
/// assert_eq!(timer.get(), 1);
/// ```
#[derive(Default)]
pub struct Timer(AtomicU64);

impl Timer {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn add(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// One slot of the client endpoint table.
///
/// A slot remembers, per outstanding proxied request, the originating
/// client's transport address, whether that client is performing its own
/// revalidation, and the cache key of the request. A slot is owned by
/// exactly one upstream exchange between allocation and release.
#[derive(Debug, Clone, Copy)]
pub struct ClientEndpoint {
    in_use: bool,
    pub validating: bool,
    pub address: SocketAddr,
    pub cache_key: CacheKey,
}

impl Default for ClientEndpoint {
    fn default() -> Self {
        Self {
            in_use: false,
            validating: false,
            address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            cache_key: [0; CACHE_KEY_LENGTH],
        }
    }
}

/// The client endpoint table.
///
/// Capacity is fixed at construction, which bounds the memory of the
/// proxy and doubles as backpressure: with every slot taken, new requests
/// are answered 5.00 until an exchange completes.
pub struct ClientEndpoints {
    slots: Vec<ClientEndpoint>,
}

impl ClientEndpoints {
    /// # Test
    ///
    /// ```
    /// use coap_proxy_service::exchange::ClientEndpoints;
    ///
    /// let client = "[::1]:49152".parse().unwrap();
    ///
    /// let mut endpoints = ClientEndpoints::new(2);
    ///
    /// let first = endpoints.allocate(client).unwrap();
    /// let second = endpoints.allocate(client).unwrap();
    ///
    /// assert_eq!(first, 0);
    /// assert_eq!(second, 1);
    /// assert_eq!(endpoints.allocate(client), None);
    ///
    /// endpoints.release(first);
    ///
    /// assert_eq!(endpoints.allocate(client), Some(0));
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![ClientEndpoint::default(); capacity],
        }
    }

    /// Claims the first free slot, scanning left to right.
    pub fn allocate(&mut self, address: SocketAddr) -> Option<usize> {
        let index = self.slots.iter().position(|slot| !slot.in_use)?;

        let slot = &mut self.slots[index];
        slot.in_use = true;
        slot.validating = false;
        slot.address = address;

        Some(index)
    }

    /// Zeroes a slot. The handle must not be used afterwards.
    pub fn release(&mut self, index: usize) {
        self.slots[index] = ClientEndpoint::default();
    }

    pub fn get(&self, index: usize) -> &ClientEndpoint {
        &self.slots[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ClientEndpoint {
        &mut self.slots[index]
    }

    /// Number of slots currently owned by an exchange.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }
}

/// The correlation key of an outstanding upstream exchange.
///
/// Responses are matched on the origin address and the token, which the
/// outbound request shares with the client's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub origin: SocketAddr,
    pub token: Token,
}

/// The record of an outstanding upstream exchange.
#[derive(Debug, Clone, Copy)]
pub struct RequestMemo {
    pub slot: usize,
    pub client: SocketAddr,
    pub message_id: u16,
    pub method: u8,
    /// Absolute expiry deadline on the manager's timer.
    pub deadline: u64,
}

struct ExchangeTable {
    endpoints: ClientEndpoints,
    memos: HashMap<MemoKey, RequestMemo>,
}

pub struct ExchangeManagerOptions<T> {
    pub capacity: usize,
    pub request_timeout: u64,
    pub handler: T,
}

/// Owns the slot table and the memo table.
///
/// Mutations come from the dispatch context and from the expiry thread,
/// which is why both tables live behind one mutex; the reference design is
/// strictly single-threaded and needs neither.
pub struct ExchangeManager<T> {
    table: Mutex<ExchangeTable>,
    timer: Timer,
    request_timeout: u64,
    handler: T,
}

impl<T> ExchangeManager<T>
where
    T: ProxyHandler + 'static,
{
    pub fn new(options: ExchangeManagerOptions<T>) -> Arc<Self> {
        let this = Arc::new(Self {
            table: Mutex::new(ExchangeTable {
                endpoints: ClientEndpoints::new(options.capacity),
                memos: HashMap::with_capacity(options.capacity),
            }),
            timer: Timer::default(),
            request_timeout: options.request_timeout,
            handler: options.handler,
        });

        // This is a background thread that advances the second timer and
        // quietly releases exchanges whose origin never answered.
        let this_ = Arc::downgrade(&this);
        thread::spawn(move || {
            let mut expired = Vec::with_capacity(16);

            while let Some(this) = this_.upgrade() {
                // The timer advances one second and gets the current time
                // offset.
                let now = this.timer.add();

                {
                    let mut table = this.table.lock();

                    // Finds exchanges that have expired.
                    table
                        .memos
                        .iter()
                        .filter(|(_, memo)| memo.deadline <= now)
                        .for_each(|(key, _)| expired.push(*key));

                    // Delete the expired exchanges. No response is
                    // synthesized for the client.
                    for key in expired.drain(..) {
                        if let Some(memo) = table.memos.remove(&key) {
                            let client = table.endpoints.get(memo.slot).address;
                            table.endpoints.release(memo.slot);
                            this.handler.on_expired(&client);
                        }
                    }
                }

                // Fixing a second tick.
                thread::sleep(Duration::from_secs(1));
            }
        });

        this
    }
}

impl<T> ExchangeManager<T> {
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// The current time offset in seconds.
    pub fn now(&self) -> u64 {
        self.timer.get()
    }

    pub fn request_timeout(&self) -> u64 {
        self.request_timeout
    }

    /// Claims a slot for a new proxied request.
    pub fn allocate(&self, address: SocketAddr) -> Option<usize> {
        self.table.lock().endpoints.allocate(address)
    }

    pub fn release(&self, slot: usize) {
        self.table.lock().endpoints.release(slot);
    }

    pub fn set_validating(&self, slot: usize) {
        self.table.lock().endpoints.get_mut(slot).validating = true;
    }

    pub fn set_cache_key(&self, slot: usize, cache_key: CacheKey) {
        self.table.lock().endpoints.get_mut(slot).cache_key = cache_key;
    }

    /// Whether an exchange with this correlation key is already in flight.
    pub fn find_memo(&self, key: &MemoKey) -> bool {
        self.table.lock().memos.contains_key(key)
    }

    pub fn insert_memo(&self, key: MemoKey, memo: RequestMemo) {
        self.table.lock().memos.insert(key, memo);
    }

    /// Completes an exchange: removes the memo and snapshots and releases
    /// its slot. The response handler is thereby called at most once per
    /// exchange.
    pub fn complete(&self, key: &MemoKey) -> Option<(RequestMemo, ClientEndpoint)> {
        let mut table = self.table.lock();

        let memo = table.memos.remove(key)?;
        let endpoint = *table.endpoints.get(memo.slot);
        table.endpoints.release(memo.slot);

        Some((memo, endpoint))
    }

    /// Completes an exchange the origin reset. A reset carries no token
    /// and correlates by message id instead.
    pub fn complete_reset(
        &self,
        origin: &SocketAddr,
        message_id: u16,
    ) -> Option<(RequestMemo, ClientEndpoint)> {
        let mut table = self.table.lock();

        let key = *table
            .memos
            .iter()
            .find(|(key, memo)| key.origin == *origin && memo.message_id == message_id)
            .map(|(key, _)| key)?;

        let memo = table.memos.remove(&key)?;
        let endpoint = *table.endpoints.get(memo.slot);
        table.endpoints.release(memo.slot);

        Some((memo, endpoint))
    }

    /// Number of exchanges currently in flight.
    pub fn waiting(&self) -> usize {
        self.table.lock().endpoints.in_use()
    }
}
