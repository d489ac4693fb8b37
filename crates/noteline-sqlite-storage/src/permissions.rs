//! File permission hardening for the database.
//!
//! Contact secrets are stored in plaintext columns, so the database file and
//! its directory are restricted to the owner on Unix (`0600`/`0700`). Other
//! platforms rely on the host placing the file in an app-private location.

use std::fs::OpenOptions;
use std::io::ErrorKind;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::Error;

/// Whether `path` names a special SQLite location rather than a file
pub(crate) fn is_special_path(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    path_str.is_empty() || path_str.starts_with(':')
}

/// Create the database file with owner-only permissions if it does not exist.
///
/// Parent directories are created as needed with owner-only permissions.
/// Creating the file before SQLite opens it avoids a window where it exists
/// with umask-dependent permissions.
pub fn precreate_secure_database_file<P>(path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if is_special_path(path) {
        return Ok(());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        set_mode(parent, 0o700)?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_file) => {
            #[cfg(unix)]
            set_mode(path, 0o600)?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Verifies that a file or directory is not group or world accessible.
#[cfg(unix)]
pub fn verify_permissions<P>(path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    let mode = std::fs::metadata(path)?.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(Error::FilePermission(format!(
            "File {:?} has insecure permissions: {:o}. Expected owner-only access.",
            path,
            mode & 0o777
        )));
    }

    Ok(())
}

/// Verifies permissions (no-op on platforms without specific support).
#[cfg(not(unix))]
pub fn verify_permissions<P>(_path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), Error> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        Error::FilePermission(format!(
            "Failed to set permissions {:o} on {:?}: {}",
            mode, path, e
        ))
    })
}
