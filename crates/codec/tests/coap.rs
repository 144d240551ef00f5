use anyhow::Result;
use bytes::BytesMut;
use coap_proxy_codec::{
    Decoder, Error,
    codes::{self, Kind, Method},
    message::MessageEncoder,
    options,
};

#[rustfmt::skip]
mod samples {
    // GET coap://[fe80::1%1]/time, Confirmable, message id 0x1234, token 0xAB.
    pub const PROXY_REQUEST: &[u8] = &[
        0x41, 0x01, 0x12, 0x34, 0xAB,
        // Proxy-Uri: delta 35 (13 + 22), length 23 (13 + 10)
        0xDD, 0x16, 0x0A,
        b'c', b'o', b'a', b'p', b':', b'/', b'/', b'[', b'f', b'e', b'8', b'0',
        b':', b':', b'1', b'%', b'1', b']', b'/', b't', b'i', b'm', b'e',
    ];

    // 2.05 Content, Acknowledgement, message id 0x1234, token 0xAB,
    // ETag 0xE1, Max-Age 60, payload "hi".
    pub const CONTENT_RESPONSE: &[u8] = &[
        0x61, 0x45, 0x12, 0x34, 0xAB,
        0x41, 0xE1,
        0xA1, 0x3C,
        0xFF, b'h', b'i',
    ];
}

#[test]
fn test_decode_proxy_request() -> Result<()> {
    let mut decoder = Decoder::default();
    let message = decoder.decode(samples::PROXY_REQUEST)?;

    assert_eq!(message.kind(), Kind::Confirmable);
    assert_eq!(message.code(), Method::Get as u8);
    assert_eq!(message.method(), Some(Method::Get));
    assert_eq!(message.message_id(), 0x1234);
    assert_eq!(message.token(), &[0xAB]);
    assert!(message.is_request());
    assert!(!message.is_response());
    assert!(message.payload().is_empty());

    assert_eq!(
        message.get(options::PROXY_URI),
        Some(&b"coap://[fe80::1%1]/time"[..])
    );
    assert_eq!(message.get(options::URI_PATH), None);

    Ok(())
}

#[test]
fn test_encode_proxy_request() -> Result<()> {
    let mut buf = BytesMut::with_capacity(128);
    let mut message = MessageEncoder::new(
        Kind::Confirmable,
        Method::Get as u8,
        0x1234,
        &[0xAB],
        &mut buf,
        128,
    )?;

    message.append(options::PROXY_URI, b"coap://[fe80::1%1]/time")?;
    let len = message.finish(&[])?;

    assert_eq!(&buf[..len], samples::PROXY_REQUEST);
    Ok(())
}

#[test]
fn test_decode_content_response() -> Result<()> {
    let mut decoder = Decoder::default();
    let message = decoder.decode(samples::CONTENT_RESPONSE)?;

    assert_eq!(message.kind(), Kind::Acknowledgement);
    assert_eq!(message.code(), codes::CONTENT);
    assert_eq!(message.method(), None);
    assert!(message.is_response());
    assert_eq!(message.token(), &[0xAB]);
    assert_eq!(message.get(options::ETAG), Some(&[0xE1][..]));
    assert_eq!(message.get_uint(options::MAX_AGE), Some(60));
    assert_eq!(message.payload(), b"hi");

    let numbers: Vec<u16> = message.options().map(|(number, _)| number).collect();
    assert_eq!(numbers, vec![options::ETAG, options::MAX_AGE]);

    Ok(())
}

#[test]
fn test_encode_content_response() -> Result<()> {
    let mut decoder = Decoder::default();
    let request = decoder.decode(samples::PROXY_REQUEST)?;

    let mut buf = BytesMut::with_capacity(128);
    let mut message = MessageEncoder::response(&request, codes::CONTENT, &mut buf, 128)?;
    message.append(options::ETAG, &[0xE1])?;
    message.append(options::MAX_AGE, &[0x3C])?;
    let len = message.finish(b"hi")?;

    assert_eq!(&buf[..len], samples::CONTENT_RESPONSE);
    Ok(())
}

#[test]
fn test_extended_option_numbers_round_trip() -> Result<()> {
    let mut buf = BytesMut::with_capacity(2048);
    let mut message =
        MessageEncoder::new(Kind::NonConfirmable, Method::Post as u8, 7, &[], &mut buf, 2048)?;

    // One-byte and two-byte extended deltas, and a two-byte extended
    // length.
    message.append(options::SIZE1, &[0x10])?;
    message.append(1000, b"x")?;
    message.append(1000, &[0x55; 300])?;
    let len = message.finish(b"body")?;
    let encoded = buf[..len].to_vec();

    let mut decoder = Decoder::default();
    let decoded = decoder.decode(&encoded)?;

    let opts: Vec<(u16, Vec<u8>)> = decoded
        .options()
        .map(|(number, value)| (number, value.to_vec()))
        .collect();

    assert_eq!(
        opts,
        vec![
            (options::SIZE1, vec![0x10]),
            (1000, b"x".to_vec()),
            (1000, vec![0x55; 300]),
        ]
    );
    assert_eq!(decoded.payload(), b"body");

    Ok(())
}

#[test]
fn test_decode_rejects_malformed_input() {
    let mut decoder = Decoder::default();

    // Too short for a header.
    assert_eq!(decoder.decode(&[0x40, 0x01, 0x00]).unwrap_err(), Error::InvalidInput);

    // Version must be 1.
    assert_eq!(
        decoder.decode(&[0x01, 0x01, 0x00, 0x00]).unwrap_err(),
        Error::UnsupportedVersion
    );

    // TKL 9 is reserved.
    assert_eq!(
        decoder.decode(&[0x49, 0x01, 0x00, 0x00]).unwrap_err(),
        Error::InvalidTokenLength
    );

    // A payload marker with nothing behind it.
    assert_eq!(
        decoder.decode(&[0x40, 0x01, 0x00, 0x00, 0xFF]).unwrap_err(),
        Error::InvalidInput
    );

    // An option whose value runs past the end of the datagram.
    assert_eq!(
        decoder.decode(&[0x40, 0x01, 0x00, 0x00, 0x21]).unwrap_err(),
        Error::InvalidOption
    );

    // Delta nibble 15 without a payload marker byte is reserved.
    assert_eq!(
        decoder.decode(&[0x40, 0x01, 0x00, 0x00, 0xF1, 0x00]).unwrap_err(),
        Error::InvalidOption
    );
}

#[test]
fn test_encoder_enforces_order_and_capacity() -> Result<()> {
    let mut buf = BytesMut::with_capacity(128);

    {
        let mut message =
            MessageEncoder::new(Kind::Confirmable, Method::Get as u8, 1, &[], &mut buf, 128)?;
        message.append(options::URI_PATH, b"a")?;

        assert_eq!(
            message.append(options::ETAG, &[0xE1]).unwrap_err(),
            Error::OutOfOrderOption
        );
    }

    {
        let mut message =
            MessageEncoder::new(Kind::Confirmable, Method::Get as u8, 1, &[], &mut buf, 8)?;

        assert_eq!(
            message.append(options::URI_PATH, b"abcdef").unwrap_err(),
            Error::NoSpace
        );
    }

    assert!(matches!(
        MessageEncoder::new(Kind::Confirmable, Method::Get as u8, 1, &[0xAB], &mut buf, 4).err(),
        Some(Error::NoSpace)
    ));

    Ok(())
}

#[test]
fn test_response_and_ack_builders() -> Result<()> {
    let mut decoder = Decoder::default();
    let request = decoder.decode(samples::PROXY_REQUEST)?;

    // A Confirmable request gets a piggybacked Acknowledgement echoing
    // message id and token.
    let mut buf = BytesMut::with_capacity(128);
    let len =
        MessageEncoder::response(&request, codes::BAD_OPTION, &mut buf, 128)?.finish(&[])?;
    assert_eq!(&buf[..len], &[0x61, 0x82, 0x12, 0x34, 0xAB]);

    let len = MessageEncoder::ack(&request, &mut buf);
    assert_eq!(&buf[..len], &[0x60, 0x00, 0x12, 0x34]);

    let len = MessageEncoder::reset(&request, &mut buf);
    assert_eq!(&buf[..len], &[0x70, 0x00, 0x12, 0x34]);

    Ok(())
}

#[test]
fn test_splice_grafts_encoded_tail() -> Result<()> {
    let mut decoder = Decoder::default();
    let request = decoder.decode(samples::PROXY_REQUEST)?;

    // Token length of the cached response is 1, so its tail starts at
    // offset 5.
    let tail = &samples::CONTENT_RESPONSE[5..];

    let mut buf = BytesMut::with_capacity(128);
    let len = MessageEncoder::response(&request, codes::CONTENT, &mut buf, 128)?.splice(tail)?;
    let spliced = buf[..len].to_vec();

    let mut decoder = Decoder::default();
    let message = decoder.decode(&spliced)?;

    assert_eq!(message.code(), codes::CONTENT);
    assert_eq!(message.token(), &[0xAB]);
    assert_eq!(message.get(options::ETAG), Some(&[0xE1][..]));
    assert_eq!(message.payload(), b"hi");

    Ok(())
}
