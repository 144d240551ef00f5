/// CoAP Option Numbers
///
/// [RFC7252]: https://tools.ietf.org/html/rfc7252#section-12.2
/// [RFC7959]: https://tools.ietf.org/html/rfc7959
///
/// Option numbers are maintained in the "CoAP Option Numbers" registry.
/// The proxy interprets Uri-Path, Uri-Query, ETag, Max-Age and Proxy-Uri
/// itself; every other option is copied through unchanged, so the full
/// registry is not mirrored here.
pub const IF_MATCH: u16 = 1;
pub const URI_HOST: u16 = 3;
pub const ETAG: u16 = 4;
pub const IF_NONE_MATCH: u16 = 5;
pub const OBSERVE: u16 = 6;
pub const URI_PORT: u16 = 7;
pub const LOCATION_PATH: u16 = 8;
pub const URI_PATH: u16 = 11;
pub const CONTENT_FORMAT: u16 = 12;
pub const MAX_AGE: u16 = 14;
pub const URI_QUERY: u16 = 15;
pub const ACCEPT: u16 = 17;
pub const LOCATION_QUERY: u16 = 20;
pub const BLOCK2: u16 = 23;
pub const BLOCK1: u16 = 27;
pub const SIZE2: u16 = 28;
pub const PROXY_URI: u16 = 35;
pub const PROXY_SCHEME: u16 = 39;
pub const SIZE1: u16 = 60;

/// NoCacheKey options do not take part in computing a cache key.
///
/// [Section 5.4.6]: https://tools.ietf.org/html/rfc7252#section-5.4.6
///
/// An option is NoCacheKey if and only if bits 1-4 of its number are
/// 11100 ([Section 5.4.6]); Size1 and Size2 are the prominent examples.
///
/// # Test
///
/// ```
/// use coap_proxy_codec::options;
///
/// assert!(options::is_no_cache_key(options::SIZE1));
/// assert!(options::is_no_cache_key(options::SIZE2));
/// assert!(!options::is_no_cache_key(options::URI_PATH));
/// assert!(!options::is_no_cache_key(options::ETAG));
/// ```
pub fn is_no_cache_key(number: u16) -> bool {
    number & 0x1e == 0x1c
}

/// Decodes a uint option value (big endian, at most 4 bytes, empty means
/// zero).
///
/// # Test
///
/// ```
/// use coap_proxy_codec::options;
///
/// assert_eq!(options::uint(&[]), Some(0));
/// assert_eq!(options::uint(&[0x3C]), Some(60));
/// assert_eq!(options::uint(&[0x01, 0x00]), Some(256));
/// assert_eq!(options::uint(&[0, 0, 0, 0, 0]), None);
/// ```
pub fn uint(value: &[u8]) -> Option<u32> {
    if value.len() > 4 {
        return None;
    }

    Some(value.iter().fold(0u32, |acc, byte| acc << 8 | *byte as u32))
}
