use std::{io::ErrorKind, net::SocketAddr, sync::Arc};

use anyhow::Result;
use service::{Service, routing::RouteResult};
use tokio::net::UdpSocket;

use crate::{
    config::Config,
    observer::Observer,
    statistics::{Statistics, Stats},
};

/// Largest datagram the proxy accepts.
pub const MAX_MESSAGE_SIZE: usize = 2048;

/// Start the udp server.
///
/// A single dispatch task runs every request and response handler in
/// sequence, which the routing core relies on; the socket is shared for
/// downstream and upstream traffic. Returns the bound address.
pub async fn run(
    config: Arc<Config>,
    statistics: &Statistics,
    service: &Service<Observer>,
) -> Result<SocketAddr> {
    let socket = Arc::new(UdpSocket::bind(config.proxy.listen).await?);
    let local_addr = socket.local_addr()?;

    let mut router = service.get_router();
    let statistics = statistics.clone();

    {
        let socket = socket.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_MESSAGE_SIZE];

            loop {
                // Note: An error will also be reported when the remote
                // host is shut down, which is not processed yet, but a
                // warning will be issued.
                let (size, address) = match socket.recv_from(&mut buffer).await {
                    Ok(it) => it,
                    Err(e) => {
                        if e.kind() != ErrorKind::ConnectionReset {
                            log::error!("udp server recv_from error={e}");

                            break;
                        } else {
                            continue;
                        }
                    }
                };

                // A CoAP message is at least a full header.
                if size < 4 {
                    continue;
                }

                statistics.add(&[Stats::ReceivedPkts(1)]);
                log::trace!("udp socket receive: size={size}, addr={address:?}");

                let (bytes, endpoint) = match router.route(&buffer[..size], address) {
                    RouteResult::Respond(res) => (res.bytes, res.endpoint),
                    RouteResult::Forward(fwd) => (fwd.bytes, fwd.endpoint),
                    RouteResult::Exceptional(e) => {
                        statistics.add(&[Stats::ErrorPkts(1)]);
                        log::trace!(
                            "udp socket process failed: size={size}, addr={address:?}, error={e}"
                        );

                        continue;
                    }
                    RouteResult::None => continue,
                };

                if let Err(e) = socket.send_to(bytes, endpoint).await {
                    if e.kind() != ErrorKind::ConnectionReset {
                        log::warn!("udp socket send error: {e:?}");
                    }
                } else {
                    statistics.add(&[Stats::SendPkts(1)]);
                    log::trace!("udp socket send: size={}, addr={endpoint:?}", bytes.len());
                }
            }
        });
    }

    log::info!("coap proxy listening: {local_addr}");
    Ok(local_addr)
}
