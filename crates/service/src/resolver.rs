use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

/// Failure modes of Proxy-Uri resolution. Every one of them surfaces to
/// the client as 4.02 Bad Option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    Relative,
    Malformed,
    UnsupportedHost,
    InvalidZone,
    UnknownInterface,
    AmbiguousLinkLocal,
    InvalidPort,
}

impl std::error::Error for ResolveError {}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The parts of an absolute Proxy-Uri.
#[derive(Debug, PartialEq, Eq)]
pub struct ProxyUri<'a> {
    pub scheme: &'a str,
    pub host: &'a str,
    pub zone: Option<&'a str>,
    pub port: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
}

impl<'a> ProxyUri<'a> {
    /// Splits an absolute URI into scheme, authority parts, path and
    /// query. A URI without a scheme separator is relative and rejected.
    ///
    /// # Test
    ///
    /// ```
    /// use coap_proxy_service::resolver::ProxyUri;
    ///
    /// let uri = ProxyUri::parse("coap://[fe80::1%1]:9999/a/b?k=v").unwrap();
    ///
    /// assert_eq!(uri.scheme, "coap");
    /// assert_eq!(uri.host, "fe80::1");
    /// assert_eq!(uri.zone, Some("1"));
    /// assert_eq!(uri.port, Some("9999"));
    /// assert_eq!(uri.path, "/a/b");
    /// assert_eq!(uri.query, Some("k=v"));
    ///
    /// assert!(ProxyUri::parse("/a/b").is_err());
    /// ```
    pub fn parse(uri: &'a str) -> Result<Self, ResolveError> {
        let (scheme, rest) = uri.split_once("://").ok_or(ResolveError::Relative)?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        {
            return Err(ResolveError::Malformed);
        }

        let (authority, path, query) = match rest.find(['/', '?']) {
            Some(index) if rest.as_bytes()[index] == b'/' => {
                let (authority, tail) = rest.split_at(index);
                match tail.split_once('?') {
                    Some((path, query)) => (authority, path, Some(query)),
                    None => (authority, tail, None),
                }
            }
            Some(index) => {
                let (authority, tail) = rest.split_at(index);
                (authority, "", Some(&tail[1..]))
            }
            None => (rest, "", None),
        };

        if authority.is_empty() {
            return Err(ResolveError::Malformed);
        }

        let (host, zone, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (inside, tail) = bracketed.split_once(']').ok_or(ResolveError::Malformed)?;

            let port = match tail.strip_prefix(':') {
                Some(port) => Some(port),
                None if tail.is_empty() => None,
                None => return Err(ResolveError::Malformed),
            };

            match inside.split_once('%') {
                Some((host, zone)) => (host, Some(zone), port),
                None => (inside, None, port),
            }
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, None, Some(port)),
                None => (authority, None, None),
            }
        };

        Ok(Self {
            scheme,
            host,
            zone,
            port,
            path,
            query,
        })
    }
}

/// A resolved origin server endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginEndpoint {
    pub address: Ipv6Addr,
    pub port: u16,
    pub interface: Option<u32>,
}

impl OriginEndpoint {
    /// The endpoint as a socket address, carrying the interface id as the
    /// IPv6 scope.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddrV6::new(self.address, self.port, 0, self.interface.unwrap_or(0)).into()
    }
}

/// Converts parsed Proxy-Uri parts into an origin endpoint.
///
/// Only IPv6 literals are supported. A zone-id must be the decimal id of
/// a registered interface; without one, a single registered interface is
/// selected implicitly. Link-local destinations with no interface to pin
/// them to are rejected, and so is an explicit port of zero.
///
/// # Test
///
/// ```
/// use coap_proxy_service::resolver::{ProxyUri, ResolveError, resolve};
///
/// let uri = ProxyUri::parse("coap://[fe80::1%1]/a").unwrap();
/// let origin = resolve(&uri, &[1]).unwrap();
///
/// assert_eq!(origin.address, "fe80::1".parse::<std::net::Ipv6Addr>().unwrap());
/// assert_eq!(origin.port, 5683);
/// assert_eq!(origin.interface, Some(1));
///
/// // Link-local with no zone and no implicit interface is ambiguous.
/// let uri = ProxyUri::parse("coap://[fe80::1]/a").unwrap();
/// assert_eq!(resolve(&uri, &[1, 2]), Err(ResolveError::AmbiguousLinkLocal));
///
/// // Hostnames and IPv4 literals are not supported.
/// let uri = ProxyUri::parse("coap://example.org/a").unwrap();
/// assert_eq!(resolve(&uri, &[1]), Err(ResolveError::UnsupportedHost));
/// ```
pub fn resolve(uri: &ProxyUri<'_>, interfaces: &[u32]) -> Result<OriginEndpoint, ResolveError> {
    let address: Ipv6Addr = uri
        .host
        .parse()
        .map_err(|_| ResolveError::UnsupportedHost)?;

    let interface = match uri.zone {
        Some(zone) => {
            let id: u32 = zone.parse().map_err(|_| ResolveError::InvalidZone)?;
            if !interfaces.contains(&id) {
                return Err(ResolveError::UnknownInterface);
            }

            Some(id)
        }
        None => match interfaces {
            [only] => Some(*only),
            _ => None,
        },
    };

    if interface.is_none() && is_link_local(&address) {
        return Err(ResolveError::AmbiguousLinkLocal);
    }

    let port = match uri.port {
        Some(port) => {
            let port: u16 = port.parse().map_err(|_| ResolveError::InvalidPort)?;
            if port == 0 {
                return Err(ResolveError::InvalidPort);
            }

            port
        }
        None => codec::PORT,
    };

    Ok(OriginEndpoint {
        address,
        port,
        interface,
    })
}

fn is_link_local(address: &Ipv6Addr) -> bool {
    address.segments()[0] & 0xffc0 == 0xfe80
}
