use std::path::Path;

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use tracing::info;

/// Throwaway certificate authority for tests.
/// Generates a self-signed root and issues leaf certificates usable for
/// both server and client authentication.
pub struct TestCa {
    ca_cert_pem: String,
    ca_key_pair: KeyPair,
    ca_cert: rcgen::Certificate,
}

/// A leaf certificate and its private key, PEM encoded.
pub struct IssuedCert {
    pub cert_pem: String,
    pub key_pem: String,
}

impl IssuedCert {
    pub fn write(&self, cert_path: &Path, key_path: &Path) -> std::io::Result<()> {
        std::fs::write(cert_path, &self.cert_pem)?;
        std::fs::write(key_path, &self.key_pem)
    }
}

impl TestCa {
    pub fn new(common_name: &str) -> Result<Self, rcgen::Error> {
        info!("Generating test CA {}", common_name);

        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let key_pair = KeyPair::generate()?;
        let ca_cert = params.self_signed(&key_pair)?;

        Ok(Self {
            ca_cert_pem: ca_cert.pem(),
            ca_key_pair: key_pair,
            ca_cert,
        })
    }

    /// Issue a leaf certificate for `common_name` valid for `sans`
    /// (DNS names or IP literals).
    pub fn issue(&self, common_name: &str, sans: &[&str]) -> Result<IssuedCert, rcgen::Error> {
        let sans: Vec<String> = sans.iter().map(|s| s.to_string()).collect();
        let mut params = CertificateParams::new(sans)?;
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::NoCa;
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let key = KeyPair::generate()?;
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key_pair)?;

        Ok(IssuedCert {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }

    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }
}
