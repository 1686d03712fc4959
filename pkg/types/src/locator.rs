use std::fmt;

use crate::addr::split_host_port;
use crate::error::Error;

/// A Kubernetes Service named by a cluster-local address such as
/// `web.default.svc.cluster.local:8080`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocator {
    pub name: String,
    pub namespace: String,
    /// Port given in the address, if any.
    pub port: Option<u16>,
}

impl ServiceLocator {
    /// Parse `<name>.<namespace><suffix>[:port]`.
    ///
    /// Returns [`Error::NotApplicable`] when the host does not end with
    /// `suffix`, and [`Error::BadParameter`] when it does but the rest is
    /// malformed.
    pub fn parse(addr: &str, suffix: &str) -> Result<Self, Error> {
        let (host, port) = if addr.contains(':') {
            let (host, port) = split_host_port(addr)?;
            (host, Some(port))
        } else {
            (addr.to_string(), None)
        };

        // a fully-qualified name with the root label names the same service
        let host = host.strip_suffix('.').unwrap_or(&host);

        let Some(name_namespace) = host.strip_suffix(suffix) else {
            return Err(Error::not_applicable(format!(
                "cannot resolve non-cluster local address {:?}",
                addr
            )));
        };

        let fields: Vec<&str> = name_namespace.split('.').collect();
        let [name, namespace] = fields.as_slice() else {
            return Err(Error::bad_parameter(format!(
                "invalid address format: expected service-name.namespace{} but got {:?}",
                suffix, addr
            )));
        };
        if name.is_empty() || namespace.is_empty() {
            return Err(Error::bad_parameter(format!(
                "invalid address format: empty service name or namespace in {:?}",
                addr
            )));
        }

        let port = match port.as_deref() {
            None | Some("") => None,
            Some(port) => Some(port.parse::<u16>().map_err(|_| {
                Error::bad_parameter(format!("invalid port {:?} in address {:?}", port, addr))
            })?),
        };

        Ok(Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: &str = ".svc.cluster.local";

    #[test]
    fn parse_with_port() {
        let loc = ServiceLocator::parse("foo.bar.svc.cluster.local:9000", SUFFIX).unwrap();
        assert_eq!(loc.name, "foo");
        assert_eq!(loc.namespace, "bar");
        assert_eq!(loc.port, Some(9000));
    }

    #[test]
    fn parse_without_port() {
        let loc = ServiceLocator::parse("foo.bar.svc.cluster.local", SUFFIX).unwrap();
        assert_eq!(loc.port, None);
        assert_eq!(loc.to_string(), "bar/foo");

        let loc = ServiceLocator::parse("foo.bar.svc.cluster.local.", SUFFIX).unwrap();
        assert_eq!((loc.name.as_str(), loc.namespace.as_str()), ("foo", "bar"));
    }

    #[test]
    fn foreign_suffix_is_not_applicable() {
        let err = ServiceLocator::parse("example.com:443", SUFFIX).unwrap_err();
        assert!(err.is_not_applicable());
        let err = ServiceLocator::parse("10.0.0.1", SUFFIX).unwrap_err();
        assert!(err.is_not_applicable());
    }

    #[test]
    fn wrong_arity_is_bad_parameter() {
        for addr in [
            "a.b.c.svc.cluster.local",
            "foo.svc.cluster.local",
            ".bar.svc.cluster.local",
            "foo..svc.cluster.local:80",
        ] {
            let err = ServiceLocator::parse(addr, SUFFIX).unwrap_err();
            assert!(err.is_bad_parameter(), "{} should be rejected", addr);
        }
    }

    #[test]
    fn bad_port_is_bad_parameter() {
        let err = ServiceLocator::parse("foo.bar.svc.cluster.local:https", SUFFIX).unwrap_err();
        assert!(err.is_bad_parameter());
    }

    #[test]
    fn custom_suffix() {
        let loc = ServiceLocator::parse("api.kube-system.svc.example.internal", ".svc.example.internal")
            .unwrap();
        assert_eq!(loc.namespace, "kube-system");
    }
}
