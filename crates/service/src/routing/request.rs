use super::{Inbound, Response, RouteResult, Upstream, reply};

use crate::{
    ProxyHandler,
    cache::{self, ResponseCache},
    exchange::{MemoKey, RequestMemo},
    resolver::{self, ProxyUri},
    rewrite,
};

use std::str;

use codec::{
    codes::{self, Kind},
    message::{MessageEncoder, Token},
    options,
};

/// The request matcher and handler.
///
/// The matcher is a catch-all: a request is for the proxy iff it carries
/// a Proxy-Uri option. This engine hosts no other resources, so anything
/// else is answered 4.04.
///
/// A matched request walks the stations of the forward path in order:
/// slot allocation, cache lookup, Proxy-Uri parsing, scheme check, origin
/// resolution, duplicate suppression, option rewriting, and finally the
/// upstream handoff. Every early exit releases the slot and answers the
/// client with the mapped response code.
pub(crate) fn proxy_request<'a, T>(req: Inbound<'_, 'a, T>) -> RouteResult<'a>
where
    T: ProxyHandler,
{
    let state = req.state;
    let message = req.payload;

    let Some(uri_bytes) = message.get(options::PROXY_URI) else {
        return reply(
            message,
            codes::NOT_FOUND,
            req.bytes,
            state.pdu_buffer_size,
            req.source,
        );
    };

    // Slot exhaustion is the backpressure signal.
    let Some(slot) = state.manager.allocate(req.source) else {
        state
            .handler
            .on_rejected(&req.source, codes::INTERNAL_SERVER_ERROR);

        return reply(
            message,
            codes::INTERNAL_SERVER_ERROR,
            req.bytes,
            state.pdu_buffer_size,
            req.source,
        );
    };

    let now = state.manager.now();

    // A fresh, method-matching cache entry short-circuits the upstream
    // entirely. A stale entry still contributes its ETag below so the
    // origin can answer 2.03 Valid instead of a full representation.
    let mut cache_etag = None;
    if let Some(cache) = &state.cache {
        let key = ResponseCache::key_generate(message);

        {
            let lock = cache.lock();
            if let Some(entry) = lock.lookup(&key) {
                if entry.request_method == message.code() && entry.is_fresh(now) {
                    let built =
                        cache::build_response(entry, message, req.bytes, state.pdu_buffer_size);

                    drop(lock);
                    state.manager.release(slot);

                    return match built {
                        Ok(len) => {
                            state.handler.on_cache_hit(&req.source);

                            RouteResult::Respond(Response {
                                bytes: &req.bytes[..len],
                                endpoint: req.source,
                            })
                        }
                        Err(e) => RouteResult::Exceptional(e),
                    };
                }

                cache_etag = entry.etag.clone();
            }
        }

        state.manager.set_cache_key(slot, key);
    }

    let Ok(uri) = str::from_utf8(uri_bytes) else {
        return bad_option(req, slot);
    };

    let Ok(uri) = ProxyUri::parse(uri) else {
        return bad_option(req, slot);
    };

    // No other scheme is supported for now.
    if uri.scheme != "coap" {
        state.manager.release(slot);
        state
            .handler
            .on_rejected(&req.source, codes::PROXYING_NOT_SUPPORTED);

        return reply(
            message,
            codes::PROXYING_NOT_SUPPORTED,
            req.bytes,
            state.pdu_buffer_size,
            req.source,
        );
    }

    let Ok(origin) = resolver::resolve(&uri, &state.interfaces) else {
        return bad_option(req, slot);
    };

    let origin = origin.socket_addr();

    // A retransmission of an exchange already in flight must not multiply
    // upstream traffic; the original exchange answers both. Confirmable
    // retransmissions get an empty ACK to quiet their timer.
    let key = MemoKey {
        origin,
        token: Token::from(message.token()),
    };

    if state.manager.find_memo(&key) {
        state.manager.release(slot);
        state.handler.on_duplicate(&req.source);

        return if message.kind() == Kind::Confirmable {
            let len = MessageEncoder::ack(message, req.bytes);

            RouteResult::Respond(Response {
                bytes: &req.bytes[..len],
                endpoint: req.source,
            })
        } else {
            RouteResult::None
        };
    }

    // The outbound request shares version, type, token length, code,
    // message id and token with the inbound one; only the option set and
    // the target differ.
    let Ok(outbound) = MessageEncoder::extend(message, req.bytes, state.pdu_buffer_size) else {
        return bad_option(req, slot);
    };

    let rewritten = match rewrite::rewrite(message, &uri, cache_etag.as_deref(), outbound) {
        Ok(rewritten) => rewritten,
        Err(_) => return bad_option(req, slot),
    };

    if rewritten.validating {
        state.manager.set_validating(slot);
    }

    state.manager.insert_memo(
        key,
        RequestMemo {
            slot,
            client: req.source,
            message_id: message.message_id(),
            method: message.code(),
            deadline: now + state.manager.request_timeout(),
        },
    );

    state.handler.on_forward(&req.source, &origin);

    RouteResult::Forward(Upstream {
        bytes: &req.bytes[..rewritten.len],
        endpoint: origin,
    })
}

fn bad_option<'a, T>(req: Inbound<'_, 'a, T>, slot: usize) -> RouteResult<'a>
where
    T: ProxyHandler,
{
    req.state.manager.release(slot);
    req.state
        .handler
        .on_rejected(&req.source, codes::BAD_OPTION);

    reply(
        req.payload,
        codes::BAD_OPTION,
        req.bytes,
        req.state.pdu_buffer_size,
        req.source,
    )
}
