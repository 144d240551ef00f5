use crate::resolver::ProxyUri;

use codec::{
    Error,
    message::{Message, MessageEncoder},
    options,
};

/// The outcome of rewriting an inbound Proxy-Uri request.
pub struct Rewritten {
    /// Total outbound message length.
    pub len: usize,
    /// Whether the client sent its own ETag and expects a 2.03 Valid to be
    /// passed through.
    pub validating: bool,
}

/// Builds the outbound option set from the inbound request in one ordered
/// pass.
///
/// Two one-shot latches keep the pass linear: the cache's ETag goes in
/// front of the first option numbered at or above ETag, and the Uri-Path
/// and Uri-Query segments derived from the Proxy-Uri go in front of the
/// first option numbered above Uri-Path. The client's own ETag is never
/// copied; it only flips the validating flag. Proxy-Uri itself is dropped
/// since the outbound request targets the origin directly. Both
/// insertions are guaranteed to trigger because Proxy-Uri is present in
/// every inbound request and numbers above both thresholds.
pub fn rewrite(
    message: &Message<'_>,
    uri: &ProxyUri<'_>,
    cache_etag: Option<&[u8]>,
    mut outbound: MessageEncoder<'_>,
) -> Result<Rewritten, Error> {
    let mut uri_path_added = false;
    let mut etag_added = false;
    let mut validating = false;

    for (number, value) in message.options() {
        if !etag_added && number >= options::ETAG {
            if let Some(etag) = cache_etag {
                outbound.append(options::ETAG, etag)?;
            }

            etag_added = true;
        }

        if number == options::ETAG {
            validating = true;
            continue;
        }

        if !uri_path_added && number > options::URI_PATH {
            add_target(&mut outbound, uri)?;
            uri_path_added = true;
        }

        if number == options::PROXY_URI {
            continue;
        }

        outbound.append(number, value)?;
    }

    let len = outbound.finish(message.payload())?;

    Ok(Rewritten { len, validating })
}

// Uri-Path splits on '/', Uri-Query on '&'; empty segments are dropped.
fn add_target(outbound: &mut MessageEncoder<'_>, uri: &ProxyUri<'_>) -> Result<(), Error> {
    for segment in uri.path.split('/').filter(|segment| !segment.is_empty()) {
        outbound.append(options::URI_PATH, segment.as_bytes())?;
    }

    if let Some(query) = uri.query {
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            outbound.append(options::URI_QUERY, pair.as_bytes())?;
        }
    }

    Ok(())
}
