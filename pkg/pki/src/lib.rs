//! Trust material: CA bundles, client key pairs and the well-known
//! secrets layout under the state directory.

#[cfg(any(test, feature = "test-utils"))]
pub mod ca;
pub mod certs;

pub use certs::{
    ClientCertificate, append_certs_from_pem, certs_from_pem, install_crypto_provider, key_pair_paths,
    load_x509_key_pair, read_pem, secret_path, state_dir,
};
