use std::fs::Permissions;
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use pkg_types::{Error, Result};
use tracing::debug;

/// Write the contents of `reader` to `dst` with `mode`, atomically.
///
/// Data goes to a temporary file in the destination directory which is then
/// renamed over `dst`; on failure `dst` is left untouched.
pub fn write_atomic(dst: &Path, mut reader: impl Read, mode: u32) -> Result<u64> {
    let dir = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |e: io::Error| Error::from_io(format!("failed to write {}", dst.display()), e);

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    let written = io::copy(&mut reader, &mut tmp).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.as_file()
        .set_permissions(Permissions::from_mode(mode))
        .map_err(io_err)?;
    tmp.persist(dst).map_err(|e| io_err(e.error))?;

    debug!("Wrote {} bytes to {}", written, dst.display());
    Ok(written)
}

/// Run `f` with a fresh temporary directory, removed afterwards.
pub fn with_temp_dir<T>(prefix: &str, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| Error::from_io("failed to create temporary directory", e))?;
    f(dir.path())
}
