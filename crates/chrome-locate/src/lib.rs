//! # chrome-locate
//!
//! Find a locally installed Chrome / Chromium / Edge executable that can be
//! driven in headless mode, so that users of `md2pdf` never have to pass a
//! browser path by hand.
//!
//! ## Search order
//!
//! On the first call to [`locate_chrome`] (first match wins):
//!
//! 1. An explicit path handed to [`locate_from`] (the CLI's `--chrome`).
//! 2. `MD2PDF_CHROME`, then `CHROME`: path to an executable. A set variable
//!    pointing at a missing file is an error, not a silent fallback.
//! 3. Well-known executable names on `PATH`.
//! 4. Platform install locations (app bundles, `Program Files`, snap, …).
//!
//! The result of the automatic search is cached for the process lifetime.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrome_locate::{locate_chrome, locate_from};
//!
//! let chrome = locate_chrome().expect("no browser installed");
//! println!("printing with {}", chrome.display());
//!
//! let pinned = locate_from(Some("/opt/chromium/chrome".as_ref()));
//! ```
//!
//! ## Platform support
//!
//! | OS      | Names on `PATH`                                             |
//! |---------|-------------------------------------------------------------|
//! | Linux   | `chromium`, `chromium-browser`, `google-chrome`, `google-chrome-stable`, `chrome`, `microsoft-edge`, `msedge` |
//! | macOS   | `chromium`, `google-chrome`, `chrome` + `.app` bundles      |
//! | Windows | `chrome.exe`, `msedge.exe` + `Program Files` locations      |

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Primary environment override.
pub const ENV_CHROME: &str = "MD2PDF_CHROME";

/// Secondary override honoured by several other headless-printing tools.
pub const ENV_CHROME_FALLBACK: &str = "CHROME";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by browser discovery.
#[derive(Error, Debug)]
pub enum LocateError {
    /// An explicit path or environment override names a file that is not there.
    #[error("Browser executable '{path}' (from {origin}) does not exist or is not executable")]
    OverrideMissing { path: PathBuf, origin: String },

    /// Nothing usable was found anywhere.
    #[error(
        "No Chrome/Chromium executable found.\n\
Searched: {}\n\
Install Chromium or Google Chrome, or set MD2PDF_CHROME=/path/to/chrome.",
        .searched.join(", ")
    )]
    NotFound { searched: Vec<String> },
}

// ── Platform tables ──────────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
const EXECUTABLE_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];

#[cfg(target_os = "macos")]
const EXECUTABLE_NAMES: &[&str] = &["chromium", "google-chrome", "chrome"];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const EXECUTABLE_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "microsoft-edge",
    "msedge",
];

/// Executable names probed on `PATH` for the current platform.
pub fn executable_names() -> &'static [&'static str] {
    EXECUTABLE_NAMES
}

/// Absolute install locations probed after `PATH`.
#[cfg(target_os = "macos")]
pub fn install_locations() -> Vec<PathBuf> {
    const BUNDLES: &[&str] = &[
        "Google Chrome.app/Contents/MacOS/Google Chrome",
        "Chromium.app/Contents/MacOS/Chromium",
        "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ];

    let mut roots = vec![PathBuf::from("/Applications")];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Applications"));
    }

    roots
        .iter()
        .flat_map(|root| BUNDLES.iter().map(move |b| root.join(b)))
        .collect()
}

/// Absolute install locations probed after `PATH`.
#[cfg(target_os = "windows")]
pub fn install_locations() -> Vec<PathBuf> {
    const SUFFIXES: &[&str] = &[
        r"Google\Chrome\Application\chrome.exe",
        r"Chromium\Application\chrome.exe",
        r"Microsoft\Edge\Application\msedge.exe",
    ];

    let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)"]
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    if let Some(local) = dirs::data_local_dir() {
        roots.push(local);
    }

    roots
        .iter()
        .flat_map(|root| SUFFIXES.iter().map(move |s| root.join(s)))
        .collect()
}

/// Absolute install locations probed after `PATH`.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn install_locations() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
        "/opt/microsoft/msedge/msedge",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local/bin/chromium"));
    }
    paths
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if a browser can be found without an explicit path.
pub fn is_chrome_available() -> bool {
    locate_chrome().is_ok()
}

/// Locate a browser using the environment, `PATH` and install locations.
///
/// Successful results are cached; failures are not, so installing a browser
/// while a long-lived process runs is picked up on the next call.
pub fn locate_chrome() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = locate_from(None)?;

    // Ignore the race: every contender resolved the same environment.
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Locate a browser, preferring `explicit` when given.
///
/// Never consults the process cache.
pub fn locate_from(explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    let lookup = |key: &str| std::env::var_os(key);
    locate_with(explicit, &lookup, &install_locations())
}

/// Search `path_var` (a `PATH`-style list) for the first executable in `names`.
pub fn find_on_path(names: &[&str], path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var).find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| is_executable(candidate))
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn locate_with(
    explicit: Option<&Path>,
    env: &dyn Fn(&str) -> Option<OsString>,
    install_locations: &[PathBuf],
) -> Result<PathBuf, LocateError> {
    // 1. Explicit path from the caller.
    if let Some(path) = explicit {
        return checked(path.to_path_buf(), "--chrome");
    }

    // 2. Environment overrides.
    for key in [ENV_CHROME, ENV_CHROME_FALLBACK] {
        if let Some(value) = env(key).filter(|v| !v.is_empty()) {
            return checked(PathBuf::from(value), key);
        }
    }

    // 3. PATH.
    if let Some(path_var) = env("PATH") {
        if let Some(found) = find_on_path(executable_names(), &path_var) {
            return Ok(found);
        }
    }

    // 4. Install locations.
    if let Some(found) = install_locations.iter().find(|p| is_executable(p)) {
        return Ok(found.clone());
    }

    let mut searched: Vec<String> = vec![
        format!("${ENV_CHROME}"),
        format!("${ENV_CHROME_FALLBACK}"),
    ];
    searched.extend(executable_names().iter().map(|n| format!("$PATH/{n}")));
    searched.extend(install_locations.iter().map(|p| p.display().to_string()));
    Err(LocateError::NotFound { searched })
}

fn checked(path: PathBuf, origin: &str) -> Result<PathBuf, LocateError> {
    if is_executable(&path) {
        Ok(path)
    } else {
        Err(LocateError::OverrideMissing {
            path,
            origin: origin.to_string(),
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fake_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn env_from(pairs: &[(&str, OsString)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn executable_names_nonempty() {
        assert!(!executable_names().is_empty());
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_executable(dir.path(), executable_names()[0]);
        let env = env_from(&[(ENV_CHROME, OsString::from("/nowhere/chrome"))]);

        let found = locate_with(Some(&exe), &env, &[]).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let env = env_from(&[]);
        let err = locate_with(Some(Path::new("/definitely/not/chrome")), &env, &[]).unwrap_err();
        assert!(matches!(err, LocateError::OverrideMissing { .. }));
        assert!(err.to_string().contains("--chrome"));
    }

    #[test]
    fn env_override_missing_file_does_not_fall_through() {
        let dir = tempfile::tempdir().unwrap();
        fake_executable(dir.path(), executable_names()[0]);
        let env = env_from(&[
            (ENV_CHROME, OsString::from("/definitely/not/chrome")),
            ("PATH", dir.path().as_os_str().to_owned()),
        ]);

        let err = locate_with(None, &env, &[]).unwrap_err();
        assert!(err.to_string().contains(ENV_CHROME));
    }

    #[test]
    fn fallback_env_var_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_executable(dir.path(), "my-chrome");
        let env = env_from(&[(ENV_CHROME_FALLBACK, exe.as_os_str().to_owned())]);

        assert_eq!(locate_with(None, &env, &[]).unwrap(), exe);
    }

    #[test]
    fn path_search_finds_known_name() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_executable(dir.path(), executable_names()[0]);
        let env = env_from(&[("PATH", dir.path().as_os_str().to_owned())]);

        assert_eq!(locate_with(None, &env, &[]).unwrap(), exe);
    }

    #[test]
    fn install_location_used_when_path_empty() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_executable(dir.path(), "installed-chrome");
        let env = env_from(&[]);

        let found = locate_with(None, &env, &[dir.path().join("missing"), exe.clone()]).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn not_found_lists_search_locations() {
        let env = env_from(&[]);
        let err = locate_with(None, &env, &[PathBuf::from("/nope/chrome")]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nope/chrome"), "got: {msg}");
        assert!(msg.contains(ENV_CHROME));
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn edge_found_under_either_linux_name() {
        for name in ["microsoft-edge", "msedge"] {
            let dir = tempfile::tempdir().unwrap();
            let exe = fake_executable(dir.path(), name);
            let env = env_from(&[("PATH", dir.path().as_os_str().to_owned())]);

            assert_eq!(locate_with(None, &env, &[]).unwrap(), exe, "{name}");
        }
    }

    #[test]
    fn directories_are_not_executables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(executable_names()[0])).unwrap();
        assert!(find_on_path(executable_names(), dir.path().as_os_str()).is_none());
    }
}
