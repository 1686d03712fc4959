use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkg_constants::{env, paths, pki};
use pkg_types::{Error, Result, ResultExt};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use tracing::debug;

/// Install ring as the process-wide rustls provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// State directory: `$CLUSTERDIAL_STATE_DIR` or the built-in default.
pub fn state_dir() -> PathBuf {
    match std::env::var(env::STATE_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(paths::DEFAULT_STATE_DIR),
    }
}

/// Path of the named secret under `state_dir`.
pub fn secret_path(state_dir: &Path, name: &str) -> PathBuf {
    state_dir.join(paths::SECRETS_SUBDIR).join(name)
}

/// Certificate and key paths of a named key pair under `state_dir`.
pub fn key_pair_paths(state_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        secret_path(state_dir, &format!("{}.{}", name, pki::CERT_SUFFIX)),
        secret_path(state_dir, &format!("{}.{}", name, pki::KEY_SUFFIX)),
    )
}

/// Read a PEM file. A missing file is reported as not found.
pub fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::from_io(format!("failed to read {}", path.display()), e))
}

/// Add every certificate in `pem` to `store`, returning how many were added.
///
/// Malformed blocks are skipped; callers that need all-or-nothing must
/// validate with [`certs_from_pem`] first.
pub fn append_certs_from_pem(store: &mut RootCertStore, pem: &[u8]) -> usize {
    let mut added = 0;
    for cert in rustls_pemfile::certs(&mut &pem[..]).flatten() {
        if store.add(cert).is_ok() {
            added += 1;
        }
    }
    debug!("Added {} trust anchors from PEM", added);
    added
}

/// Parse all certificates in `pem`, failing on the first malformed block.
pub fn certs_from_pem(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::bad_parameter(format!("malformed PEM certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(Error::bad_parameter("no certificates found in PEM data"));
    }
    Ok(certs)
}

/// A client certificate chain and its signing key, ready for mTLS.
#[derive(Clone)]
pub struct ClientCertificate {
    certified: Arc<CertifiedKey>,
}

impl ClientCertificate {
    /// Parse a PEM certificate chain and PEM private key (PKCS#1, PKCS#8 or SEC1).
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let chain = certs_from_pem(cert_pem)?;
        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(|e| Error::bad_parameter(format!("malformed PEM private key: {}", e)))?
            .ok_or_else(|| Error::bad_parameter("no private key found in PEM data"))?;
        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
            .map_err(|e| Error::bad_parameter(format!("unsupported private key: {}", e)))?;
        Ok(Self {
            certified: Arc::new(CertifiedKey::new(chain, signing_key)),
        })
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.certified.cert
    }

    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        self.certified.clone()
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("chain_len", &self.certified.cert.len())
            .finish()
    }
}

/// Load a certificate/key pair from PEM files.
pub fn load_x509_key_pair(cert_file: &Path, key_file: &Path) -> Result<ClientCertificate> {
    let cert_pem = read_pem(cert_file)?;
    let key_pem = read_pem(key_file)?;
    ClientCertificate::from_pem(&cert_pem, &key_pem).with_context(|| {
        format!(
            "failed to load key pair {} / {}",
            cert_file.display(),
            key_file.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::TestCa;

    #[test]
    fn secret_paths() {
        let state = Path::new("/var/lib/clusterdial");
        assert_eq!(
            secret_path(state, "root.cert"),
            PathBuf::from("/var/lib/clusterdial/secrets/root.cert")
        );
        let (cert, key) = key_pair_paths(state, "planet-rpc-client");
        assert!(cert.ends_with("secrets/planet-rpc-client.cert"));
        assert!(key.ends_with("secrets/planet-rpc-client.key"));
    }

    #[test]
    fn missing_pem_is_not_found() {
        let err = read_pem(Path::new("/nonexistent/root.cert")).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/nonexistent/root.cert"));
    }

    #[test]
    fn malformed_pem_adds_no_anchor() {
        let mut store = RootCertStore::empty();
        let added = append_certs_from_pem(&mut store, b"-----BEGIN CERTIFICATE-----\nnot base64\n");
        assert_eq!(added, 0);
        assert!(store.is_empty());
        assert!(certs_from_pem(b"garbage").is_err());
    }

    #[test]
    fn ca_pem_becomes_anchor() {
        let ca = TestCa::new("test-ca").unwrap();
        let mut store = RootCertStore::empty();
        assert_eq!(append_certs_from_pem(&mut store, ca.ca_cert_pem().as_bytes()), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_key_pair_from_files() {
        let ca = TestCa::new("test-ca").unwrap();
        let issued = ca.issue("kubelet", &["localhost"]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("kubelet.cert");
        let key_path = dir.path().join("kubelet.key");
        issued.write(&cert_path, &key_path).unwrap();

        let cert = load_x509_key_pair(&cert_path, &key_path).unwrap();
        assert_eq!(cert.chain().len(), 1);

        // key file swapped for a certificate
        let err = load_x509_key_pair(&cert_path, &cert_path).unwrap_err();
        assert!(err.is_bad_parameter());
        assert!(err.to_string().starts_with("failed to load key pair"));
        assert!(err.to_string().contains("kubelet.cert"));
    }
}
