use crate::{
    Error, Options,
    codes::{self, Kind, Method},
    options,
};

use std::ops::Range;

use bytes::{BufMut, BytesMut};

/// Maximum token length (TKL values 9-15 are reserved).
pub const TOKEN_MAX: usize = 8;

/// An owned copy of a message token, usable as a map key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    bytes: [u8; TOKEN_MAX],
    length: u8,
}

impl Token {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.length as usize]
    }
}

impl From<&[u8]> for Token {
    /// # Test
    ///
    /// ```
    /// use coap_proxy_codec::message::Token;
    ///
    /// let token = Token::from(&[0xAB, 0xCD][..]);
    ///
    /// assert_eq!(token.as_slice(), &[0xAB, 0xCD]);
    /// ```
    fn from(value: &[u8]) -> Self {
        let length = value.len().min(TOKEN_MAX);

        let mut token = Token::default();
        token.bytes[..length].copy_from_slice(&value[..length]);
        token.length = length as u8;
        token
    }
}

#[derive(Debug)]
pub struct Message<'a> {
    /// message source bytes.
    bytes: &'a [u8],
    /// message payload range, empty when no payload marker was present.
    payload: Range<usize>,
    // message option list.
    options: &'a Options,
}

impl<'a> Message<'a> {
    /// # Test
    ///
    /// ```
    /// use coap_proxy_codec::{Options, codes::Kind, message::Message};
    ///
    /// let buffer = [0x41, 0x01, 0x12, 0x34, 0xAB, 0xB1, 0x61];
    ///
    /// let mut options = Options::default();
    /// let message = Message::decode(&buffer, &mut options).unwrap();
    ///
    /// assert_eq!(message.kind(), Kind::Confirmable);
    /// assert_eq!(message.code(), 0x01);
    /// assert_eq!(message.message_id(), 0x1234);
    /// assert_eq!(message.token(), &[0xAB]);
    /// assert!(message.payload().is_empty());
    /// ```
    pub fn decode(bytes: &'a [u8], options: &'a mut Options) -> Result<Self, Error> {
        // There must be at least a complete header.
        if bytes.len() < 4 {
            return Err(Error::InvalidInput);
        }

        if bytes[0] >> 6 != 1 {
            return Err(Error::UnsupportedVersion);
        }

        let token_length = (bytes[0] & 0x0F) as usize;
        if token_length > TOKEN_MAX {
            return Err(Error::InvalidTokenLength);
        }

        if bytes.len() < 4 + token_length {
            return Err(Error::InvalidInput);
        }

        let mut number = 0u16;
        let mut offset = 4 + token_length;
        let mut payload = bytes.len()..bytes.len();

        while offset < bytes.len() {
            let byte = bytes[offset];
            offset += 1;

            // A payload marker with nothing behind it is a format error.
            if byte == 0xFF {
                if offset == bytes.len() {
                    return Err(Error::InvalidInput);
                }

                payload = offset..bytes.len();
                break;
            }

            let delta = decode_extended(bytes, &mut offset, byte >> 4)?;
            let length = decode_extended(bytes, &mut offset, byte & 0x0F)? as usize;

            number = number.checked_add(delta).ok_or(Error::InvalidOption)?;
            if bytes.len() - offset < length {
                return Err(Error::InvalidOption);
            }

            options.append(number, offset..offset + length);
            offset += length;
        }

        Ok(Self {
            bytes,
            payload,
            options,
        })
    }

    /// message source bytes, e.g. for relaying the message verbatim.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        Kind::from_bits(self.bytes[0] >> 4)
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.bytes[1]
    }

    /// message method, for messages in the request class.
    pub fn method(&self) -> Option<Method> {
        Method::try_from(self.code()).ok()
    }

    #[inline]
    pub fn message_id(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }

    #[inline]
    pub fn token(&self) -> &'a [u8] {
        &self.bytes[4..4 + (self.bytes[0] & 0x0F) as usize]
    }

    pub fn is_request(&self) -> bool {
        codes::is_request(self.code())
    }

    pub fn is_response(&self) -> bool {
        codes::is_response(self.code())
    }

    /// get the first occurrence of an option.
    pub fn get(&self, number: u16) -> Option<&'a [u8]> {
        let range = self.options.get(number)?;

        Some(&self.bytes[range])
    }

    /// get every occurrence of an option, in wire order.
    pub fn get_all(&self, number: u16) -> impl Iterator<Item = &'a [u8]> {
        let bytes = self.bytes;

        self.options.get_all(number).map(move |range| &bytes[range.clone()])
    }

    /// get an option interpreted as a uint.
    ///
    /// # Test
    ///
    /// ```
    /// use coap_proxy_codec::{Decoder, options};
    ///
    /// // 2.03 Valid carrying Max-Age 120.
    /// let buffer = [0x61, 0x43, 0x00, 0x07, 0xAB, 0xD1, 0x01, 0x78];
    ///
    /// let mut decoder = Decoder::default();
    /// let message = decoder.decode(&buffer).unwrap();
    ///
    /// assert_eq!(message.get_uint(options::MAX_AGE), Some(120));
    /// ```
    pub fn get_uint(&self, number: u16) -> Option<u32> {
        options::uint(self.get(number)?)
    }

    /// every option in ascending option-number order.
    pub fn options(&self) -> impl Iterator<Item = (u16, &'a [u8])> {
        let bytes = self.bytes;

        self.options
            .iter()
            .map(move |(number, range)| (*number, &bytes[range.clone()]))
    }

    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.payload.clone()]
    }
}

fn decode_extended(bytes: &[u8], offset: &mut usize, nibble: u8) -> Result<u16, Error> {
    Ok(match nibble {
        13 => {
            if *offset >= bytes.len() {
                return Err(Error::InvalidOption);
            }

            let value = bytes[*offset] as u16 + 13;
            *offset += 1;
            value
        }
        14 => {
            if bytes.len() - *offset < 2 {
                return Err(Error::InvalidOption);
            }

            let value = u16::from_be_bytes([bytes[*offset], bytes[*offset + 1]]);
            *offset += 2;
            value.checked_add(269).ok_or(Error::InvalidOption)?
        }
        // 15 is reserved for the payload marker, which is handled before
        // the nibbles are split.
        15 => return Err(Error::InvalidOption),
        _ => nibble as u16,
    })
}

/// Writes a message into a caller-owned buffer, enforcing the capacity of
/// the scratch PDU buffer and the ascending option-number invariant.
pub struct MessageEncoder<'a> {
    bytes: &'a mut BytesMut,
    limit: usize,
    last_number: u16,
}

impl<'a> MessageEncoder<'a> {
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coap_proxy_codec::codes::{Kind, Method};
    /// use coap_proxy_codec::message::MessageEncoder;
    /// use coap_proxy_codec::options;
    ///
    /// let mut buf = BytesMut::with_capacity(128);
    /// let mut message = MessageEncoder::new(
    ///     Kind::Confirmable,
    ///     Method::Get as u8,
    ///     0x1234,
    ///     &[0xAB],
    ///     &mut buf,
    ///     128,
    /// )
    /// .unwrap();
    ///
    /// message.append(options::URI_PATH, b"a").unwrap();
    /// let len = message.finish(b"hi").unwrap();
    ///
    /// assert_eq!(
    ///     &buf[..len],
    ///     &[0x41, 0x01, 0x12, 0x34, 0xAB, 0xB1, 0x61, 0xFF, 0x68, 0x69]
    /// );
    /// ```
    pub fn new(
        kind: Kind,
        code: u8,
        message_id: u16,
        token: &[u8],
        bytes: &'a mut BytesMut,
        limit: usize,
    ) -> Result<Self, Error> {
        if token.len() > TOKEN_MAX {
            return Err(Error::InvalidTokenLength);
        }

        if 4 + token.len() > limit {
            return Err(Error::NoSpace);
        }

        bytes.clear();
        bytes.put_u8(0x40 | u8::from(kind) << 4 | token.len() as u8);
        bytes.put_u8(code);
        bytes.put_u16(message_id);
        bytes.put(token);

        Ok(Self {
            bytes,
            limit,
            last_number: 0,
        })
    }

    /// rely on an inbound request to create the outbound request.
    ///
    /// Version, type, token length, code, message id and token are taken
    /// over unchanged; the option set and payload are written by the
    /// caller.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coap_proxy_codec::Decoder;
    /// use coap_proxy_codec::message::MessageEncoder;
    ///
    /// let buffer = [0x41, 0x01, 0x12, 0x34, 0xAB, 0xB1, 0x61];
    ///
    /// let mut decoder = Decoder::default();
    /// let old = decoder.decode(&buffer).unwrap();
    ///
    /// let mut buf = BytesMut::with_capacity(128);
    /// let message = MessageEncoder::extend(&old, &mut buf, 128).unwrap();
    /// let len = message.finish(&[]).unwrap();
    ///
    /// assert_eq!(&buf[..len], &buffer[..5]);
    /// ```
    pub fn extend(message: &Message<'_>, bytes: &'a mut BytesMut, limit: usize) -> Result<Self, Error> {
        let header = 4 + message.token().len();
        if header > limit {
            return Err(Error::NoSpace);
        }

        bytes.clear();
        bytes.put(&message.as_bytes()[..header]);

        Ok(Self {
            bytes,
            limit,
            last_number: 0,
        })
    }

    /// rely on a received message to create a response to its sender.
    ///
    /// A Confirmable message gets a piggybacked Acknowledgement, anything
    /// else keeps its type; message id and token are echoed so the
    /// exchange correlates at the client.
    pub fn response(
        message: &Message<'_>,
        code: u8,
        bytes: &'a mut BytesMut,
        limit: usize,
    ) -> Result<Self, Error> {
        let kind = match message.kind() {
            Kind::Confirmable => Kind::Acknowledgement,
            kind => kind,
        };

        Self::new(kind, code, message.message_id(), message.token(), bytes, limit)
    }

    /// write an empty Acknowledgement for a Confirmable message.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coap_proxy_codec::Decoder;
    /// use coap_proxy_codec::message::MessageEncoder;
    ///
    /// let buffer = [0x41, 0x01, 0x12, 0x34, 0xAB, 0xB1, 0x61];
    ///
    /// let mut decoder = Decoder::default();
    /// let old = decoder.decode(&buffer).unwrap();
    ///
    /// let mut buf = BytesMut::with_capacity(128);
    /// let len = MessageEncoder::ack(&old, &mut buf);
    ///
    /// assert_eq!(&buf[..len], &[0x60, 0x00, 0x12, 0x34]);
    /// ```
    pub fn ack(message: &Message<'_>, bytes: &'a mut BytesMut) -> usize {
        bytes.clear();
        bytes.put_u8(0x40 | u8::from(Kind::Acknowledgement) << 4);
        bytes.put_u8(codes::EMPTY);
        bytes.put_u16(message.message_id());

        4
    }

    /// write an empty Reset for a message, e.g. to answer a CoAP ping.
    pub fn reset(message: &Message<'_>, bytes: &'a mut BytesMut) -> usize {
        bytes.clear();
        bytes.put_u8(0x40 | u8::from(Kind::Reset) << 4);
        bytes.put_u8(codes::EMPTY);
        bytes.put_u16(message.message_id());

        4
    }

    /// append an option.
    ///
    /// Options must be appended in ascending option-number order; the
    /// delta encoding cannot express anything else.
    pub fn append(&mut self, number: u16, value: &[u8]) -> Result<(), Error> {
        if number < self.last_number {
            return Err(Error::OutOfOrderOption);
        }

        if value.len() > u16::MAX as usize {
            return Err(Error::InvalidOption);
        }

        let delta = number - self.last_number;
        let length = value.len() as u16;

        let need = 1 + extended_size(delta) + extended_size(length) + value.len();
        if self.bytes.len() + need > self.limit {
            return Err(Error::NoSpace);
        }

        self.bytes.put_u8(nibble(delta) << 4 | nibble(length));
        put_extended(self.bytes, delta);
        put_extended(self.bytes, length);
        self.bytes.put(value);

        self.last_number = number;
        Ok(())
    }

    /// finalize the option sequence and append the payload.
    ///
    /// The payload marker is only emitted for a non-empty payload. Returns
    /// the total message length.
    pub fn finish(self, payload: &[u8]) -> Result<usize, Error> {
        if !payload.is_empty() {
            if self.bytes.len() + 1 + payload.len() > self.limit {
                return Err(Error::NoSpace);
            }

            self.bytes.put_u8(0xFF);
            self.bytes.put(payload);
        }

        Ok(self.bytes.len())
    }

    /// append an already encoded option-and-payload tail verbatim.
    ///
    /// Option deltas restart at every message header, so the tail of one
    /// message can be grafted behind the header of another. Returns the
    /// total message length.
    pub fn splice(self, tail: &[u8]) -> Result<usize, Error> {
        if self.bytes.len() + tail.len() > self.limit {
            return Err(Error::NoSpace);
        }

        self.bytes.put(tail);

        Ok(self.bytes.len())
    }
}

#[inline]
fn nibble(value: u16) -> u8 {
    if value < 13 {
        value as u8
    } else if value < 269 {
        13
    } else {
        14
    }
}

#[inline]
fn extended_size(value: u16) -> usize {
    if value < 13 {
        0
    } else if value < 269 {
        1
    } else {
        2
    }
}

#[inline]
fn put_extended(bytes: &mut BytesMut, value: u16) {
    if value >= 269 {
        bytes.put_u16(value - 269);
    } else if value >= 13 {
        bytes.put_u8((value - 13) as u8);
    }
}
