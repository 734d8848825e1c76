//! Endpoint identity and network-interface address resolution.
//!
//! A sender is configured with either a literal IPv4 address (`"192.168.1.7"`)
//! or a network interface name (`"eth0"`, `"wlan0"`).  Anything that splits
//! into four dot-separated parts is treated as an address; everything else is
//! looked up through an [`InterfaceResolver`].
//!
//! The identity is fixed once constructed.  Re-resolving an interface after
//! its address changes means building a new endpoint.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;
use tracing::warn;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 4444;

/// Local port a UDP receiver binds when none is configured.
pub const DEFAULT_RECEIVER_PORT: u16 = 4445;

/// Error type for endpoint construction.
#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    /// The value looked like a dotted quad but did not parse.
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// No IPv4 address is assigned to the named interface.
    #[error("could not resolve an IPv4 address for interface {0:?}")]
    UnresolvedInterface(String),
}

/// Looks up the IPv4 address assigned to a named network interface.
pub trait InterfaceResolver {
    /// Returns the interface's IPv4 address, or `None` if it has none.
    fn resolve_interface_ip(&self, name: &str) -> Option<Ipv4Addr>;
}

/// Resolver backed by the operating system's interface table.
///
/// On unix platforms this walks the `getifaddrs` list.  On other platforms
/// no lookup is available and every name resolves to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaceResolver;

impl InterfaceResolver for SystemInterfaceResolver {
    fn resolve_interface_ip(&self, name: &str) -> Option<Ipv4Addr> {
        match lookup_ipv4(name) {
            Ok(Some(ip)) => Some(ip),
            Ok(None) => {
                warn!("interface {name:?} has no IPv4 address");
                None
            }
            Err(e) => {
                warn!("interface lookup for {name:?} failed: {e}");
                None
            }
        }
    }
}

/// An immutable `(IPv4 address, port)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointIdentity {
    address: Ipv4Addr,
    port: u16,
}

impl EndpointIdentity {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// Builds an endpoint from a dotted quad or an interface name.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidAddress`] for a malformed dotted quad
    /// and [`EndpointError::UnresolvedInterface`] when the resolver finds no
    /// address for the interface.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgtrans_core::{EndpointIdentity, SystemInterfaceResolver};
    ///
    /// let ep = EndpointIdentity::resolve("127.0.0.1", 4444, &SystemInterfaceResolver).unwrap();
    /// assert_eq!(ep.socket_addr().to_string(), "127.0.0.1:4444");
    /// ```
    pub fn resolve(
        interface_or_ip: &str,
        port: u16,
        resolver: &dyn InterfaceResolver,
    ) -> Result<Self, EndpointError> {
        let value = interface_or_ip.trim();
        if looks_like_ipv4(value) {
            let address = value
                .parse()
                .map_err(|_| EndpointError::InvalidAddress(value.to_string()))?;
            return Ok(Self::new(address, port));
        }

        resolver
            .resolve_interface_ip(value)
            .map(|address| Self::new(address, port))
            .ok_or_else(|| EndpointError::UnresolvedInterface(value.to_string()))
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Returns `true` when `value` has the shape of a dotted quad.
pub fn looks_like_ipv4(value: &str) -> bool {
    value.split('.').count() == 4
}

#[cfg(unix)]
fn lookup_ipv4(name: &str) -> std::io::Result<Option<Ipv4Addr>> {
    use std::ffi::CStr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: on success `head` points to a list owned by libc that is
    // released with `freeifaddrs` before returning.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut found = None;
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` is a non-null node of the live list.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;
        if entry.ifa_name.is_null() || entry.ifa_addr.is_null() {
            continue;
        }

        // SAFETY: `ifa_name` is a NUL-terminated string owned by the list.
        let ifname = unsafe { CStr::from_ptr(entry.ifa_name) };
        if ifname.to_bytes() != name.as_bytes() {
            continue;
        }

        // SAFETY: `ifa_addr` is non-null and at least a `sockaddr`.
        let family = unsafe { (*entry.ifa_addr).sa_family };
        if i32::from(family) != libc::AF_INET {
            continue;
        }

        // SAFETY: family is AF_INET, so the address is a `sockaddr_in`.
        let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        found = Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
        break;
    }

    // SAFETY: `head` came from a successful `getifaddrs` call.
    unsafe { libc::freeifaddrs(head) };
    Ok(found)
}

#[cfg(not(unix))]
fn lookup_ipv4(_name: &str) -> std::io::Result<Option<Ipv4Addr>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "interface lookup requires a unix platform",
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Option<Ipv4Addr>);

    impl InterfaceResolver for FixedResolver {
        fn resolve_interface_ip(&self, _name: &str) -> Option<Ipv4Addr> {
            self.0
        }
    }

    #[test]
    fn test_resolve_literal_ip_skips_resolver() {
        // Arrange: a resolver that would give a different answer
        let resolver = FixedResolver(Some(Ipv4Addr::new(10, 0, 0, 1)));

        // Act
        let ep = EndpointIdentity::resolve("192.168.1.7", 8000, &resolver).unwrap();

        // Assert
        assert_eq!(ep.address(), Ipv4Addr::new(192, 168, 1, 7));
        assert_eq!(ep.port(), 8000);
    }

    #[test]
    fn test_resolve_interface_name_uses_resolver() {
        let resolver = FixedResolver(Some(Ipv4Addr::new(10, 0, 0, 1)));
        let ep = EndpointIdentity::resolve("wlan0", DEFAULT_PORT, &resolver).unwrap();
        assert_eq!(ep.to_string(), "10.0.0.1:4444");
    }

    #[test]
    fn test_resolve_unknown_interface_is_error() {
        let resolver = FixedResolver(None);
        let result = EndpointIdentity::resolve("eth9", DEFAULT_PORT, &resolver);
        assert_eq!(
            result,
            Err(EndpointError::UnresolvedInterface("eth9".to_string()))
        );
    }

    #[test]
    fn test_resolve_malformed_dotted_quad_is_invalid_address() {
        let resolver = FixedResolver(None);
        let result = EndpointIdentity::resolve("300.1.2.3", DEFAULT_PORT, &resolver);
        assert!(matches!(result, Err(EndpointError::InvalidAddress(_))));
    }

    #[test]
    fn test_looks_like_ipv4() {
        assert!(looks_like_ipv4("0.0.0.0"));
        assert!(looks_like_ipv4("a.b.c.d"));
        assert!(!looks_like_ipv4("eth0"));
        assert!(!looks_like_ipv4("1.2.3"));
    }

    #[test]
    fn test_socket_addr_matches_fields() {
        let ep = EndpointIdentity::new(Ipv4Addr::LOCALHOST, 5000);
        assert_eq!(ep.socket_addr(), "127.0.0.1:5000".parse().unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_resolver_finds_loopback() {
        // Most Linux hosts and containers name the loopback interface `lo`.
        let ip = SystemInterfaceResolver.resolve_interface_ip("lo");
        if let Some(ip) = ip {
            assert!(ip.is_loopback());
        }
    }

    #[test]
    fn test_system_resolver_unknown_interface_is_none() {
        let ip = SystemInterfaceResolver.resolve_interface_ip("definitely-not-an-iface0");
        assert!(ip.is_none());
    }
}
