use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// CoAP Method Codes
///
/// [RFC7252]: https://tools.ietf.org/html/rfc7252#section-12.1.1
/// [RFC8132]: https://tools.ietf.org/html/rfc8132
///
/// A request code is in the 0.xx class with a non-zero detail. GET, POST,
/// PUT and DELETE come from [RFC7252]; FETCH, PATCH and iPATCH from
/// [RFC8132]. The proxy forwards any of them unchanged, caching semantics
/// only ever apply to the safe methods (GET and FETCH).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Method {
    Get = 0x01,
    Post = 0x02,
    Put = 0x03,
    Delete = 0x04,
    Fetch = 0x05,
    Patch = 0x06,
    IPatch = 0x07,
}

impl Method {
    /// Whether responses to this method may enter a cache.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get | Method::Fetch)
    }
}

/// Message types from the CoAP header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
pub enum Kind {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl Kind {
    /// # Test
    ///
    /// ```
    /// use coap_proxy_codec::codes::Kind;
    ///
    /// assert_eq!(Kind::from_bits(0), Kind::Confirmable);
    /// assert_eq!(Kind::from_bits(2), Kind::Acknowledgement);
    /// ```
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Confirmable,
            1 => Self::NonConfirmable,
            2 => Self::Acknowledgement,
            _ => Self::Reset,
        }
    }
}

pub const EMPTY: u8 = 0x00;

pub const CREATED: u8 = 0x41;
pub const DELETED: u8 = 0x42;
pub const VALID: u8 = 0x43;
pub const CHANGED: u8 = 0x44;
pub const CONTENT: u8 = 0x45;

pub const BAD_REQUEST: u8 = 0x80;
pub const BAD_OPTION: u8 = 0x82;
pub const NOT_FOUND: u8 = 0x84;

pub const INTERNAL_SERVER_ERROR: u8 = 0xA0;
pub const GATEWAY_TIMEOUT: u8 = 0xA4;
pub const PROXYING_NOT_SUPPORTED: u8 = 0xA5;

pub fn class(code: u8) -> u8 {
    code >> 5
}

/// Whether a code marks a request (class 0 with a non-zero detail).
pub fn is_request(code: u8) -> bool {
    class(code) == 0 && code != EMPTY
}

/// Whether a code marks a response (classes 2 through 5).
pub fn is_response(code: u8) -> bool {
    (2..=5).contains(&class(code))
}

/// Renders a code in the usual c.dd notation.
///
/// # Test
///
/// ```
/// use coap_proxy_codec::codes;
///
/// assert_eq!(codes::Dotted(codes::VALID).to_string(), "2.03");
/// assert_eq!(codes::Dotted(codes::PROXYING_NOT_SUPPORTED).to_string(), "5.05");
/// ```
pub struct Dotted(pub u8);

impl fmt::Display for Dotted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 >> 5, self.0 & 0x1F)
    }
}
