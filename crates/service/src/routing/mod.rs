pub(crate) mod request;
pub(crate) mod response;

use crate::{ProxyHandler, Service, cache::ResponseCache, exchange::ExchangeManager};

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use codec::{
    Decoder,
    message::{Message, MessageEncoder},
};
use parking_lot::Mutex;

pub(crate) struct State<T> {
    pub manager: Arc<ExchangeManager<T>>,
    pub cache: Option<Arc<Mutex<ResponseCache>>>,
    pub interfaces: Arc<Vec<u32>>,
    pub pdu_buffer_size: usize,
    pub handler: T,
}

/// A message for the proxy to send back towards a client.
#[derive(Debug)]
pub struct Response<'a> {
    pub bytes: &'a [u8],
    pub endpoint: SocketAddr,
}

/// A rewritten request for the proxy to send to an origin server.
#[derive(Debug)]
pub struct Upstream<'a> {
    pub bytes: &'a [u8],
    pub endpoint: SocketAddr,
}

#[derive(Debug)]
pub enum RouteResult<'a> {
    Exceptional(codec::Error),
    Respond(Response<'a>),
    Forward(Upstream<'a>),
    None,
}

pub(crate) struct Inbound<'a, 'b, T> {
    pub source: SocketAddr,
    pub state: &'a State<T>,
    pub bytes: &'b mut BytesMut,
    pub payload: &'a Message<'a>,
}

pub struct Router<T> {
    state: State<T>,
    decoder: Decoder,
    bytes: BytesMut,
}

impl<T> Router<T>
where
    T: ProxyHandler + Clone,
{
    pub(crate) fn new(service: &Service<T>) -> Self {
        Self {
            bytes: BytesMut::with_capacity(service.pdu_buffer_size),
            decoder: Decoder::default(),
            state: State {
                manager: service.manager.clone(),
                cache: service.cache.clone(),
                interfaces: service.interfaces.clone(),
                pdu_buffer_size: service.pdu_buffer_size,
                handler: service.handler.clone(),
            },
        }
    }

    /// Routes one datagram through the proxy.
    ///
    /// Requests run the matcher and the request handler; everything else
    /// is treated as upstream traffic and correlated against the
    /// outstanding exchanges. The returned borrows point either into
    /// `bytes` (verbatim relay) or into the router's scratch buffer.
    pub fn route<'a, 'b: 'a>(
        &'b mut self,
        bytes: &'b [u8],
        address: SocketAddr,
    ) -> RouteResult<'a> {
        let message = match self.decoder.decode(bytes) {
            Ok(message) => message,
            Err(e) => return RouteResult::Exceptional(e),
        };

        let req = Inbound {
            source: address,
            state: &self.state,
            bytes: &mut self.bytes,
            payload: &message,
        };

        if message.is_request() {
            request::proxy_request(req)
        } else {
            response::origin_response(bytes, req)
        }
    }
}

/// Builds a proxy-generated response with no options and no payload.
pub(crate) fn reply<'a>(
    message: &Message<'_>,
    code: u8,
    bytes: &'a mut BytesMut,
    limit: usize,
    endpoint: SocketAddr,
) -> RouteResult<'a> {
    match MessageEncoder::response(message, code, bytes, limit).and_then(|reply| reply.finish(&[]))
    {
        Ok(len) => RouteResult::Respond(Response {
            bytes: &bytes[..len],
            endpoint,
        }),
        Err(e) => RouteResult::Exceptional(e),
    }
}
