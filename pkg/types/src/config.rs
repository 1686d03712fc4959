use serde::{Deserialize, Serialize};

use crate::error::Error;

/// CLI configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// dns-addr: 127.0.0.2:53
/// state-dir: /var/lib/clusterdial
/// service-suffix: .svc.cluster.local
/// api-host: https://leader.cluster.local:6443
/// dial-timeout-secs: 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialConfigFile {
    #[serde(default, alias = "dns-addr")]
    pub dns_addr: Option<String>,
    #[serde(default, alias = "state-dir")]
    pub state_dir: Option<String>,
    #[serde(default, alias = "service-suffix")]
    pub service_suffix: Option<String>,
    #[serde(default, alias = "api-host")]
    pub api_host: Option<String>,
    #[serde(default, alias = "dial-timeout-secs")]
    pub dial_timeout_secs: Option<u64>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> Result<T, Error> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(Error::from_io(format!("failed to read {}", path), e)),
    };
    serde_yaml::from_str(&content)
        .map_err(|e| Error::config(format!("failed to parse config file {}", path), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: DialConfigFile = load_config_file("/nonexistent/clusterdial.yaml").unwrap();
        assert!(cfg.dns_addr.is_none());
        assert!(cfg.dial_timeout_secs.is_none());
    }

    #[test]
    fn kebab_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "dns-addr: 127.0.0.2\nstate-dir: /tmp/state\ndial-timeout-secs: 3\n",
        )
        .unwrap();

        let cfg: DialConfigFile = load_config_file(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.dns_addr.as_deref(), Some("127.0.0.2"));
        assert_eq!(cfg.state_dir.as_deref(), Some("/tmp/state"));
        assert_eq!(cfg.dial_timeout_secs, Some(3));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "dial-timeout-secs: [not, a, number]\n").unwrap();

        let err = load_config_file::<DialConfigFile>(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
