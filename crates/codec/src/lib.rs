//! ## The Constrained Application Protocol (CoAP)
//!
//! [RFC7252]: https://tools.ietf.org/html/rfc7252
//! [Section 3]: https://tools.ietf.org/html/rfc7252#section-3
//!
//! The Constrained Application Protocol (CoAP) is a specialized web
//! transfer protocol for use with constrained nodes and constrained
//! (e.g., low-power, lossy) networks. The protocol is designed for
//! machine-to-machine (M2M) applications such as smart energy and
//! building automation. CoAP provides a request/response interaction
//! model between application endpoints, supports built-in discovery
//! of services and resources, and includes key concepts of the Web
//! such as URIs and Internet media types. The message format is
//! described in [Section 3]: a fixed 4-byte header, a variable-length
//! token, a sequence of options in ascending option-number order, and
//! an optional payload introduced by a one-byte marker.

pub mod codes;
pub mod message;
pub mod options;

use std::ops::Range;

use self::message::Message;

/// The default CoAP UDP port.
pub const PORT: u16 = 5683;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    InvalidInput,
    UnsupportedVersion,
    InvalidTokenLength,
    InvalidOption,
    OutOfOrderOption,
    NoSpace,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A cache of the list of options, this is for internal use only.
#[derive(Debug, Clone)]
pub struct Options(Vec<(u16, Range<usize>)>);

impl Default for Options {
    fn default() -> Self {
        Self(Vec::with_capacity(16))
    }
}

impl Options {
    /// Adds an option to the list.
    pub fn append(&mut self, number: u16, range: Range<usize>) {
        self.0.push((number, range));
    }

    /// Gets an option from the list.
    ///
    /// Note: This function will only look for the first matching option in
    /// the list and return it.
    pub fn get(&self, number: u16) -> Option<Range<usize>> {
        self.0
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| v.clone())
    }

    /// Gets all the values of an option from the list.
    ///
    /// A CoAP message can carry an option multiple times (Uri-Path is the
    /// usual case), and this function yields every occurrence in wire order.
    pub fn get_all(&self, number: u16) -> impl Iterator<Item = &Range<usize>> {
        self.0
            .iter()
            .filter(move |(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    /// Yields every option in wire order, which decoding guarantees to be
    /// ascending option-number order.
    pub fn iter(&self) -> impl Iterator<Item = &(u16, Range<usize>)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        if !self.0.is_empty() {
            self.0.clear();
        }
    }
}

#[derive(Default)]
pub struct Decoder(Options);

impl Decoder {
    /// # Test
    ///
    /// ```
    /// use coap_proxy_codec::{Decoder, codes, options};
    ///
    /// let buffer = [
    ///     0x41, 0x01, 0x12, 0x34, 0xAB, 0xB1, 0x61, 0xFF, 0x68, 0x69,
    /// ];
    ///
    /// let mut decoder = Decoder::default();
    /// let message = decoder.decode(&buffer).unwrap();
    ///
    /// assert_eq!(message.code(), codes::Method::Get as u8);
    /// assert_eq!(message.message_id(), 0x1234);
    /// assert_eq!(message.token(), &[0xAB]);
    /// assert_eq!(message.get(options::URI_PATH), Some(&b"a"[..]));
    /// assert_eq!(message.payload(), b"hi");
    /// ```
    pub fn decode<'a>(&'a mut self, bytes: &'a [u8]) -> Result<Message<'a>, Error> {
        self.0.clear();

        Message::decode(bytes, &mut self.0)
    }
}
