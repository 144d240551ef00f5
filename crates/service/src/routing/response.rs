use super::{Inbound, Response, RouteResult, reply};

use crate::{ProxyHandler, cache, exchange::MemoKey};

use codec::{
    codes::{self, Kind},
    message::{MessageEncoder, Token},
    options,
};

/// The origin response handler.
///
/// Anything that is not a request lands here and is correlated against
/// the outstanding exchanges by origin address and token; unmatched
/// traffic is dropped. A completed exchange always releases its slot,
/// whatever the disposition of the response:
///
/// - with the cache disabled, or for any response that is not a 2.03
///   Valid, or when the client ran its own revalidation, the response
///   bytes are relayed verbatim (and, where cacheable, ingested);
/// - a 2.03 Valid that the proxy provoked itself extends the entry's
///   freshness and dispatches the cached representation instead.
pub(crate) fn origin_response<'a, T>(bytes: &'a [u8], req: Inbound<'_, 'a, T>) -> RouteResult<'a>
where
    T: ProxyHandler,
{
    let state = req.state;
    let message = req.payload;

    // A reset ends the exchange; transport-level failures are never
    // turned into client responses here. Resets carry no token and
    // correlate by message id.
    if message.kind() == Kind::Reset {
        if let Some((_, endpoint)) = state
            .manager
            .complete_reset(&req.source, message.message_id())
        {
            state.handler.on_reset(&endpoint.address);
        }

        return RouteResult::None;
    }

    let key = MemoKey {
        origin: req.source,
        token: Token::from(message.token()),
    };

    // A CoAP ping is answered with a reset; an empty ACK only quiets
    // retransmission and leaves the exchange open for the separate
    // response that follows.
    if message.code() == codes::EMPTY {
        return match message.kind() {
            Kind::Confirmable => {
                let len = MessageEncoder::reset(message, req.bytes);

                RouteResult::Respond(Response {
                    bytes: &req.bytes[..len],
                    endpoint: req.source,
                })
            }
            _ => RouteResult::None,
        };
    }

    let Some((memo, endpoint)) = state.manager.complete(&key) else {
        return RouteResult::None;
    };

    let now = state.manager.now();

    if let Some(cache) = &state.cache {
        if message.code() == codes::VALID && !endpoint.validating {
            // The proxy provoked this 2.03 itself; the client never sees
            // it. Extend the entry and dispatch the cached
            // representation.
            let deadline = now
                + message
                    .get_uint(options::MAX_AGE)
                    .unwrap_or(cache::DEFAULT_MAX_AGE) as u64;

            let mut lock = cache.lock();

            return match lock.revalidate(&endpoint.cache_key, deadline) {
                Some(entry) => {
                    match cache::build_response(entry, message, req.bytes, state.pdu_buffer_size)
                    {
                        Ok(len) => {
                            state.handler.on_revalidated(&endpoint.address);

                            RouteResult::Respond(Response {
                                bytes: &req.bytes[..len],
                                endpoint: endpoint.address,
                            })
                        }
                        Err(e) => RouteResult::Exceptional(e),
                    }
                }
                // The entry the origin just validated has been evicted in
                // the meantime; 5.04 ends the exchange so the client can
                // retry it from scratch.
                None => {
                    state
                        .handler
                        .on_rejected(&endpoint.address, codes::GATEWAY_TIMEOUT);

                    reply(
                        message,
                        codes::GATEWAY_TIMEOUT,
                        req.bytes,
                        state.pdu_buffer_size,
                        endpoint.address,
                    )
                }
            };
        }

        cache
            .lock()
            .process(&endpoint.cache_key, memo.method, bytes, now);
    }

    state.handler.on_dispatch(&endpoint.address, message.code());

    RouteResult::Respond(Response {
        bytes,
        endpoint: endpoint.address,
    })
}
