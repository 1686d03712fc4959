use std::path::Path;

use pkg_constants::pki::{ROOT_CERT_FILENAME, RUNTIME_RPC_KEY_PAIR};
use pkg_pki::{key_pair_paths, load_x509_key_pair, read_pem, secret_path};
use pkg_types::Result;
use tracing::debug;

use crate::client::{ClientBuilder, HttpClient};

/// Client for the container runtime's RPC endpoint.
///
/// Trusts the cluster CA. The runtime client certificate is presented only
/// when its key is installed under `state_dir`.
pub fn runtime_rpc_client(state_dir: &Path, builder: ClientBuilder) -> Result<HttpClient> {
    let ca = read_pem(&secret_path(state_dir, ROOT_CERT_FILENAME))?;
    let mut builder = builder.ca(ca);

    let (cert_path, key_path) = key_pair_paths(state_dir, RUNTIME_RPC_KEY_PAIR);
    if key_path.exists() {
        builder = builder.client_cert(load_x509_key_pair(&cert_path, &key_path)?);
    } else {
        debug!("No runtime client key at {}, skipping client certificate", key_path.display());
    }
    Ok(builder.build())
}
