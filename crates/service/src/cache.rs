use ahash::{HashMap, HashMapExt};
use bytes::BytesMut;
use codec::{
    Options,
    codes::{self, Method},
    message::{Message, MessageEncoder},
    options,
};
use sha2::{Digest, Sha256};

/// Width of a cache key, the SHA-256 digest length.
pub const CACHE_KEY_LENGTH: usize = 32;

pub type CacheKey = [u8; CACHE_KEY_LENGTH];

/// Freshness assumed when a response carries no Max-Age option.
///
/// [Section 5.10.5]: https://tools.ietf.org/html/rfc7252#section-5.10.5
///
/// Max-Age defaults to 60 seconds per [Section 5.10.5].
pub const DEFAULT_MAX_AGE: u32 = 60;

#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Maximum number of cached responses.
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// A cached origin response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The code of the request this response answered; a hit requires the
    /// methods to match.
    pub request_method: u8,
    /// The response message verbatim, as received from the origin.
    pub response: Vec<u8>,
    /// The response ETag, extracted once at insertion.
    pub etag: Option<Vec<u8>>,
    /// Absolute freshness deadline in whole seconds.
    pub max_age: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: u64) -> bool {
        self.max_age > now
    }

    pub fn code(&self) -> u8 {
        self.response[1]
    }

    /// The encoded option-and-payload bytes behind the cached header.
    pub fn tail(&self) -> &[u8] {
        &self.response[4 + (self.response[0] & 0x0F) as usize..]
    }
}

/// The response cache, keyed by a digest of the request.
pub struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            entries: HashMap::with_capacity(options.capacity),
            capacity: options.capacity,
        }
    }

    /// Derives the cache key of a request.
    ///
    /// The digest covers the request code, every option that is neither an
    /// ETag nor NoCacheKey, and the payload. Skipping the ETag is what
    /// lets a validation request map onto the entry it validates.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coap_proxy_service::cache::ResponseCache;
    /// use codec::codes::{Kind, Method};
    /// use codec::message::MessageEncoder;
    /// use codec::{Decoder, options};
    ///
    /// let mut buf = BytesMut::with_capacity(128);
    /// let mut plain = Decoder::default();
    /// let mut validating = Decoder::default();
    ///
    /// let mut message =
    ///     MessageEncoder::new(Kind::Confirmable, Method::Get as u8, 1, &[0x01], &mut buf, 128)
    ///         .unwrap();
    /// message.append(options::URI_PATH, b"a").unwrap();
    /// let len = message.finish(&[]).unwrap();
    /// let plain_bytes = buf[..len].to_vec();
    ///
    /// let mut message =
    ///     MessageEncoder::new(Kind::Confirmable, Method::Get as u8, 2, &[0x02], &mut buf, 128)
    ///         .unwrap();
    /// message.append(options::ETAG, &[0xE0]).unwrap();
    /// message.append(options::URI_PATH, b"a").unwrap();
    /// let len = message.finish(&[]).unwrap();
    /// let validating_bytes = buf[..len].to_vec();
    ///
    /// // The token, message id and ETag do not disturb the key.
    /// assert_eq!(
    ///     ResponseCache::key_generate(&plain.decode(&plain_bytes).unwrap()),
    ///     ResponseCache::key_generate(&validating.decode(&validating_bytes).unwrap()),
    /// );
    /// ```
    pub fn key_generate(message: &Message<'_>) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update([message.code()]);

        for (number, value) in message.options() {
            if number == options::ETAG || options::is_no_cache_key(number) {
                continue;
            }

            hasher.update(number.to_be_bytes());
            hasher.update((value.len() as u16).to_be_bytes());
            hasher.update(value);
        }

        hasher.update(message.payload());
        hasher.finalize().into()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Ingests an origin response.
    ///
    /// Only responses to GET and FETCH become entries. A 2.03 Valid never
    /// becomes an entry of its own; it extends the freshness of the entry
    /// it validates, using its Max-Age when present.
    pub fn process(&mut self, key: &CacheKey, method: u8, response: &[u8], now: u64) {
        let mut options_buf = Options::default();
        let Ok(message) = Message::decode(response, &mut options_buf) else {
            return;
        };

        let max_age = now
            + message
                .get_uint(options::MAX_AGE)
                .unwrap_or(DEFAULT_MAX_AGE) as u64;

        if message.code() == codes::VALID {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.max_age = max_age;
            }

            return;
        }

        if !Method::try_from(method).is_ok_and(|method| method.is_cacheable()) {
            return;
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict();
        }

        self.entries.insert(
            *key,
            CacheEntry {
                request_method: method,
                etag: message.get(options::ETAG).map(|etag| etag.to_vec()),
                response: response.to_vec(),
                max_age,
            },
        );
    }

    /// Extends the freshness of an entry, handing the refreshed entry
    /// back.
    pub fn revalidate(&mut self, key: &CacheKey, deadline: u64) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(key)?;
        entry.max_age = deadline;

        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Drops the entry closest to its freshness deadline.
    fn evict(&mut self) {
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.max_age)
            .map(|(key, _)| *key)
        {
            self.entries.remove(&key);
        }
    }
}

/// Builds the client-facing response for a cache entry.
///
/// A GET or FETCH request whose ETag matches the entry's gets a 2.03
/// Valid echoing that ETag; anything else gets the cached code with the
/// cached option-and-payload tail spliced behind a fresh header.
pub fn build_response(
    entry: &CacheEntry,
    message: &Message<'_>,
    bytes: &mut BytesMut,
    limit: usize,
) -> Result<usize, codec::Error> {
    if message.method().is_some_and(|method| method.is_cacheable()) {
        // Searching for more ETags might become necessary in the future.
        if let (Some(request_etag), Some(cache_etag)) = (message.get(options::ETAG), &entry.etag) {
            if request_etag == cache_etag.as_slice() {
                let mut response = MessageEncoder::response(message, codes::VALID, bytes, limit)?;
                response.append(options::ETAG, request_etag)?;

                return response.finish(&[]);
            }
        }
    }

    MessageEncoder::response(message, entry.code(), bytes, limit)?.splice(entry.tail())
}
