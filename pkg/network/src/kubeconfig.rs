//! Locating the kubeconfig used for service lookups.

use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use pkg_constants::paths;
use pkg_types::{Error, Result, ResultExt};
use tracing::debug;

/// Whether this process runs inside the managed container runtime.
pub fn in_container_runtime() -> bool {
    Path::new(paths::CONTAINER_ENVIRONMENT_FILE).exists()
}

/// Kubeconfig path for the current execution environment.
///
/// Inside the container runtime this is the fixed path. On the host it is
/// found relative to the runtime's root filesystem, located through the
/// `kubectl` helper on `PATH`.
pub fn kubeconfig_path() -> Result<PathBuf> {
    if in_container_runtime() {
        return Ok(PathBuf::from(paths::KUBECONFIG));
    }
    let search_path = std::env::var_os("PATH").unwrap_or_default();
    kubeconfig_from_search_path(&search_path).context("failed to locate kubeconfig")
}

/// Kubeconfig under the root filesystem of the `kubectl` found on
/// `search_path`, after resolving symlinks.
pub fn kubeconfig_from_search_path(search_path: &OsStr) -> Result<PathBuf> {
    let kubectl = find_on_path(paths::KUBECTL, search_path)
        .ok_or_else(|| Error::not_found(format!("{} not found on PATH", paths::KUBECTL)))?;
    let kubectl = std::fs::canonicalize(&kubectl)
        .map_err(|e| Error::from_io(format!("failed to resolve {}", kubectl.display()), e))?;

    let path = kubeconfig_relative_to(&kubectl);
    debug!("Using kubeconfig {}", path.display());
    Ok(path)
}

/// Kubeconfig under the root filesystem three levels above the directory of
/// `executable`.
pub fn kubeconfig_relative_to(executable: &Path) -> PathBuf {
    let root = executable.ancestors().nth(4).unwrap_or(Path::new("/"));
    root.join(paths::KUBECONFIG.trim_start_matches('/'))
}

/// First executable file named `name` in the directories of `search_path`.
pub fn find_on_path(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_to_runtime_rootfs() {
        let path = kubeconfig_relative_to(Path::new("/var/lib/runtime/rootfs/usr/local/bin/kubectl"));
        assert_eq!(
            path,
            PathBuf::from("/var/lib/runtime/rootfs/etc/kubernetes/kubectl.kubeconfig")
        );
    }

    #[test]
    fn shallow_executable_uses_root() {
        let path = kubeconfig_relative_to(Path::new("/bin/kubectl"));
        assert_eq!(path, PathBuf::from("/etc/kubernetes/kubectl.kubeconfig"));
    }

    fn install_executable(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn symlinked_helper_resolves_to_rootfs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("rootfs");
        let kubectl = root.join("usr/local/bin/kubectl");
        install_executable(&kubectl);

        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::os::unix::fs::symlink(&kubectl, bin.join("kubectl")).unwrap();

        let empty = dir.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        let search_path = std::env::join_paths([&empty, &bin]).unwrap();

        let path = kubeconfig_from_search_path(&search_path).unwrap();
        let root = std::fs::canonicalize(&root).unwrap();
        assert_eq!(path, root.join("etc/kubernetes/kubectl.kubeconfig"));
    }

    #[test]
    fn helper_missing_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_on_path("kubectl", dir.path().as_os_str()), None);

        let err = kubeconfig_from_search_path(dir.path().as_os_str()).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("kubectl"));
    }

    #[test]
    fn executable_bit_required() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::write(&plain, "").unwrap();
        assert!(!is_executable(&plain));

        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&plain));
        assert!(!is_executable(dir.path()));
    }
}
