use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Transport kind of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
}

/// Address family a network is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Any,
    V4,
    V6,
}

impl Network {
    pub fn is_stream(&self) -> bool {
        matches!(self, Network::Tcp | Network::Tcp4 | Network::Tcp6)
    }

    pub fn family(&self) -> Family {
        match self {
            Network::Tcp | Network::Udp => Family::Any,
            Network::Tcp4 | Network::Udp4 => Family::V4,
            Network::Tcp6 | Network::Udp6 => Family::V6,
        }
    }

    /// Whether `ip` may be used on this network.
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        match self.family() {
            Family::Any => true,
            Family::V4 => ip.is_ipv4(),
            Family::V6 => ip.is_ipv6(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Udp => "udp",
            Network::Udp4 => "udp4",
            Network::Udp6 => "udp6",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            "udp" => Ok(Network::Udp),
            "udp4" => Ok(Network::Udp4),
            "udp6" => Ok(Network::Udp6),
            other => Err(Error::bad_parameter(format!("unknown network {:?}", other))),
        }
    }
}

/// A network address: transport kind plus `host` or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub network: Network,
    pub addr: String,
}

impl Address {
    pub fn new(network: Network, addr: impl Into<String>) -> Self {
        Self {
            network,
            addr: addr.into(),
        }
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(Network::Tcp, addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.network, self.addr)
    }
}

/// Split `host:port` or `[host]:port` into its parts.
///
/// The port is required and may be empty (`"host:"`); a bare host without
/// a colon is an error, as is an unbracketed host containing colons.
pub fn split_host_port(hostport: &str) -> Result<(String, String), Error> {
    let invalid = |reason: &str| {
        Error::bad_parameter(format!("address {:?}: {}", hostport, reason))
    };

    if let Some(rest) = hostport.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid("missing ']' in address"))?;
        let port = match after.strip_prefix(':') {
            Some(port) => port,
            None if after.is_empty() => return Err(invalid("missing port in address")),
            None => return Err(invalid("unexpected characters after ']'")),
        };
        if port.contains(':') || host.contains('[') || host.contains(']') {
            return Err(invalid("too many colons in address"));
        }
        return Ok((host.to_string(), port.to_string()));
    }

    let (host, port) = hostport
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port in address"))?;
    if host.contains(':') {
        return Err(invalid("too many colons in address"));
    }
    if host.contains('[') || host.contains(']') || port.contains(']') {
        return Err(invalid("unexpected bracket in address"));
    }
    Ok((host.to_string(), port.to_string()))
}

/// Join host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: impl fmt::Display) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_networks() {
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert_eq!("udp6".parse::<Network>().unwrap(), Network::Udp6);
        assert!("sctp".parse::<Network>().unwrap_err().is_bad_parameter());
        assert!(Network::Tcp4.is_stream());
        assert!(!Network::Udp.is_stream());
        assert!(Network::Tcp4.accepts(&"10.0.0.1".parse().unwrap()));
        assert!(!Network::Tcp4.accepts(&"::1".parse().unwrap()));
    }

    #[test]
    fn split_valid_addresses() {
        assert_eq!(
            split_host_port("example.com:443").unwrap(),
            ("example.com".to_string(), "443".to_string())
        );
        assert_eq!(
            split_host_port("[::1]:8080").unwrap(),
            ("::1".to_string(), "8080".to_string())
        );
        assert_eq!(
            split_host_port("foo.bar.svc.cluster.local:").unwrap(),
            ("foo.bar.svc.cluster.local".to_string(), String::new())
        );
    }

    #[test]
    fn split_invalid_addresses() {
        assert!(split_host_port("example.com").is_err());
        assert!(split_host_port("::1:80").is_err());
        assert!(split_host_port("[::1").is_err());
        assert!(split_host_port("[::1]").is_err());
        assert!(split_host_port("[::1]x80").is_err());
    }

    #[test]
    fn join_brackets_ipv6() {
        assert_eq!(join_host_port("10.0.0.1", 443), "10.0.0.1:443");
        assert_eq!(join_host_port("fd00::1", "53"), "[fd00::1]:53");
    }

    #[test]
    fn address_display() {
        let addr = Address::tcp("127.0.0.1:3022");
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:3022");
    }
}
