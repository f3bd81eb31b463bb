//! Listener addresses.
//!
//! An [`Address`] is the (IP version, host, port) triple both listener kinds
//! bind to. The host may be a literal IP or a name resolved at bind time; the
//! version picks which resolved address is used.

use crate::runtime::TransportError;
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use thiserror::Error;

/// IP protocol version of a listener address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Version of a concrete socket address.
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => IpVersion::V4,
            SocketAddr::V6(_) => IpVersion::V6,
        }
    }
}

/// Address a listener binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub version: IpVersion,
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(version: IpVersion, host: impl Into<String>, port: u16) -> Self {
        Self {
            version,
            host: host.into(),
            port,
        }
    }

    pub fn v4(host: impl Into<String>, port: u16) -> Self {
        Self::new(IpVersion::V4, host, port)
    }

    pub fn v6(host: impl Into<String>, port: u16) -> Self {
        Self::new(IpVersion::V6, host, port)
    }

    /// Resolve to a concrete socket address of the requested version.
    pub fn resolve(&self) -> Result<SocketAddr, TransportError> {
        let family_mismatch = || TransportError::AddressFamily {
            host: self.host.clone(),
            version: self.version,
        };

        if let Ok(ip) = self.host.parse::<IpAddr>() {
            let addr = SocketAddr::new(ip, self.port);
            if IpVersion::of(&addr) != self.version {
                return Err(family_mismatch());
            }
            return Ok(addr);
        }

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: self.host.clone(),
                source,
            })?
            .find(|addr| IpVersion::of(addr) == self.version)
            .ok_or_else(family_mismatch)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(IpVersion::of(&addr), addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            IpVersion::V4 => write!(f, "{}:{}", self.host, self.port),
            IpVersion::V6 => write!(f, "[{}]:{}", self.host, self.port),
        }
    }
}

/// Error parsing a `host:port` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address {0:?}: expected host:port")]
pub struct AddressParseError(String);

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts `ip:port`, `[ipv6]:port` or `host:port`. Names default to IPv4.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        let invalid = || AddressParseError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }

        let version = if host.contains(':') {
            IpVersion::V6
        } else {
            IpVersion::V4
        };
        Ok(Self::new(version, host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_addresses() {
        let addr: Address = "127.0.0.1:1234".parse().unwrap();
        assert_eq!(addr, Address::v4("127.0.0.1", 1234));

        let addr: Address = "[::1]:8080".parse().unwrap();
        assert_eq!(addr, Address::v6("::1", 8080));
        assert_eq!(addr.to_string(), "[::1]:8080");
    }

    #[test]
    fn test_parse_hostname() {
        let addr: Address = "localhost:1234".parse().unwrap();
        assert_eq!(addr.version, IpVersion::V4);
        assert_eq!(addr.host, "localhost");
        assert_eq!(addr.port, 1234);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("127.0.0.1".parse::<Address>().is_err());
        assert!(":1234".parse::<Address>().is_err());
        assert!("host:notaport".parse::<Address>().is_err());
    }

    #[test]
    fn test_resolve_literal() {
        let addr = Address::v4("127.0.0.1", 9000).resolve().unwrap();
        assert_eq!(addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_resolve_version_mismatch() {
        let err = Address::v6("127.0.0.1", 9000).resolve().unwrap_err();
        assert!(matches!(err, TransportError::AddressFamily { .. }));
    }
}
