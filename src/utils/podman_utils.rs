use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};

/// Environment variable that points the runtime adapter at another podman.
pub const PODMAN_BIN_ENV: &str = "PODMAN_BIN";

static PODMAN_BIN_OVERRIDE: OnceLock<Mutex<Option<OsString>>> = OnceLock::new();

/// Resolve the executable name used for invoking podman commands.
///
/// An explicit override wins, then `PODMAN_BIN`, then plain `podman` from
/// `PATH`. Tests use this to inject the mock podman binary.
#[must_use]
pub fn resolve_podman_binary() -> OsString {
    let mutex = PODMAN_BIN_OVERRIDE.get_or_init(|| Mutex::new(None));
    let guard = mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(path) = guard.clone() {
        return path;
    }
    std::env::var_os(PODMAN_BIN_ENV)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| OsString::from("podman"))
}

/// Override the podman executable path for the current process.
pub fn set_podman_binary_override(path: OsString) {
    let mutex = PODMAN_BIN_OVERRIDE.get_or_init(|| Mutex::new(None));
    let mut guard = mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = Some(path);
}

/// Clear any configured podman executable override.
pub fn clear_podman_binary_override() {
    let mutex = PODMAN_BIN_OVERRIDE.get_or_init(|| Mutex::new(None));
    let mut guard = mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = None;
}

/// True when podman's stderr says the image is not in local storage.
#[must_use]
pub fn is_unknown_image_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("image not known") || lower.contains("no such image")
}
