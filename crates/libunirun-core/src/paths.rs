//! Runtime directory and on-disk endpoint locations
//!
//! Lock files and Unix socket files live in a per-user runtime directory:
//! the configured override, else `$XDG_RUNTIME_DIR/unirun`, else
//! `<temp>/unirun-<uid>`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::scope::ScopeNames;

/// Longest socket path we bind; `sun_path` is 104 bytes on macOS, 108 on Linux
pub const MAX_SOCKET_PATH_LEN: usize = 100;

/// Longest lock file name we create; most file systems stop at 255 bytes
pub const MAX_LOCK_FILE_NAME_LEN: usize = 200;

/// Uid of the current process
#[cfg(unix)]
pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

/// Pick the runtime directory without touching the filesystem
pub fn resolve_runtime_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    // Prefer XDG_RUNTIME_DIR which is properly secured by systemd
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join("unirun");
        }
    }

    #[cfg(unix)]
    {
        std::env::temp_dir().join(format!("unirun-{}", current_uid()))
    }

    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("unirun")
    }
}

/// Resolve the runtime directory and make sure it exists and belongs to us
pub fn runtime_dir(override_dir: Option<&Path>) -> Result<PathBuf, CoreError> {
    let dir = resolve_runtime_dir(override_dir);
    ensure_runtime_dir(&dir)?;
    Ok(dir)
}

#[cfg(unix)]
fn ensure_runtime_dir(dir: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::{DirBuilderExt, MetadataExt};

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|source| CoreError::RuntimeDir {
            path: dir.to_path_buf(),
            source,
        })?;

    let meta = std::fs::metadata(dir).map_err(|source| CoreError::RuntimeDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if meta.uid() != current_uid() {
        return Err(CoreError::RuntimeDirInsecure {
            path: dir.to_path_buf(),
            owner: meta.uid(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_runtime_dir(dir: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dir).map_err(|source| CoreError::RuntimeDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Location of the arbitration lock file
pub fn lock_path(runtime_dir: &Path, names: &ScopeNames) -> PathBuf {
    let readable = names.lock_file_name();
    if readable.len() <= MAX_LOCK_FILE_NAME_LEN {
        return runtime_dir.join(readable);
    }

    let digest = hex::encode(Sha256::digest(names.lock_name.as_bytes()));
    runtime_dir.join(format!("Mutex_{}.lock", &digest[..32]))
}

/// Location of the leader's Unix socket.
///
/// Falls back to a digest of the channel name when the readable name would not
/// fit in `sun_path`.
pub fn socket_path(runtime_dir: &Path, names: &ScopeNames) -> PathBuf {
    let readable = runtime_dir.join(format!("{}.sock", names.channel_file_stem()));
    if readable.as_os_str().len() <= MAX_SOCKET_PATH_LEN {
        return readable;
    }

    let digest = hex::encode(Sha256::digest(names.channel_name.as_bytes()));
    runtime_dir.join(format!("Pipe_{}.sock", &digest[..32]))
}

/// Windows pipe name for the channel, shortened like `socket_path`
pub fn pipe_name(names: &ScopeNames) -> String {
    let stem = names.channel_file_stem();
    if stem.len() <= MAX_LOCK_FILE_NAME_LEN {
        return format!(r"\\.\pipe\{}", stem);
    }

    let digest = hex::encode(Sha256::digest(names.channel_name.as_bytes()));
    format!(r"\\.\pipe\Pipe_{}", &digest[..32])
}
