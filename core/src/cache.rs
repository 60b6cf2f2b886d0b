//! On-disk interception cache for PUMAPI responses.
//!
//! # Design
//! Responses are stored as plain text files under
//! `<root>/<action>/<signature>.txt`, where the signature is built from the
//! request's sorted, non-secret parameters. A non-200 status is kept in a
//! sibling `<signature>_status-code.txt`. The cache is a convenience for
//! testing and for slow actions, never a source of truth: a miss is an
//! ordinary `None`, and failing to store a response only gets logged.
//!
//! One gateway owns a cache root at a time. There is no locking.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{PpmsError, Result};
use crate::http::{HttpResponse, Params};

/// Action kept by `flush(true)`: re-fetching every user is the slowest thing
/// PUMAPI does.
pub const KEEP_ON_FLUSH_ACTION: &str = "getuser";

/// Parameter keys never part of a signature.
const EXCLUDED_KEYS: [&str; 2] = ["action", "apikey"];

/// Signature used when a request carries no other parameters.
const EMPTY_SIGNATURE: &str = "response";

const STATUS_SUFFIX: &str = "_status-code.txt";

/// Canonical file stem addressing a cached response within its action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.0)
    }

    pub fn status_file_name(&self) -> String {
        format!("{}{STATUS_SUFFIX}", self.0)
    }

    /// Whether the signature names a file directly inside its action
    /// directory. Parameter values carrying a path separator do not.
    pub fn is_plain_file_name(&self) -> bool {
        !self.0.contains(['/', '\\'])
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the signature of a request from its parameters.
///
/// Keys are visited in sorted order and `action` / `apikey` are skipped, so
/// the result only depends on the set of remaining pairs.
pub fn signature_for(params: &Params) -> Signature {
    let pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| !EXCLUDED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| format!("{key}--{value}"))
        .collect();

    if pairs.is_empty() {
        Signature(EMPTY_SIGNATURE.to_string())
    } else {
        Signature(pairs.join("__"))
    }
}

/// Read-through / write-through response cache rooted at a directory.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    root: Option<PathBuf>,
    only_action: Option<String>,
}

impl ResponseCache {
    /// A cache rooted at `root`, or a disabled cache for `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            only_action: None,
        }
    }

    /// Restrict caching to a single action; every other action misses and is
    /// never written.
    pub fn with_only_action(mut self, action: Option<String>) -> Self {
        self.only_action = action;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn set_root(&mut self, root: Option<PathBuf>) {
        debug!(root = ?root, "switching response cache root");
        self.root = root;
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// Whether responses to `action` are read from and written to the cache.
    pub fn caches(&self, action: &str) -> bool {
        self.root.is_some() && self.only_action.as_deref().is_none_or(|only| only == action)
    }

    /// Path of the body file for a request, if caching applies to it.
    pub fn entry_path(&self, action: &str, params: &Params) -> Option<PathBuf> {
        if !self.caches(action) {
            return None;
        }
        let root = self.root.as_ref()?;
        let signature = signature_for(params);
        if !signature.is_plain_file_name() {
            return None;
        }
        Some(root.join(action).join(signature.file_name()))
    }

    /// Look up a stored response. `None` means "go on-line".
    pub fn read(&self, action: &str, params: &Params) -> Option<HttpResponse> {
        let Some(root) = &self.root else {
            debug!(action, "no cache path configured");
            return None;
        };
        if !self.caches(action) {
            debug!(action, "action excluded from caching");
            return None;
        }

        let signature = signature_for(params);
        if !signature.is_plain_file_name() {
            warn!(action, %signature, "signature contains a path separator, not using the cache");
            return None;
        }
        let dir = root.join(action);
        let body_path = dir.join(signature.file_name());
        if !body_path.is_file() {
            debug!(path = %body_path.display(), "no cache hit");
            return None;
        }

        let body = match fs::read_to_string(&body_path) {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %body_path.display(), error = %e, "reading cached response failed");
                return None;
            }
        };
        debug!(path = %body_path.display(), "read intercepted response text");

        let mut status = 200;
        let status_path = dir.join(signature.status_file_name());
        if status_path.is_file() {
            match read_status(&status_path) {
                Ok(code) => {
                    debug!(path = %status_path.display(), code, "read intercepted status code");
                    status = code;
                }
                Err(reason) => {
                    warn!(path = %status_path.display(), %reason, "ignoring unreadable status code file");
                }
            }
        }

        Some(HttpResponse { status, body })
    }

    /// Store a response. Failures are logged and otherwise ignored.
    pub fn write(&self, action: &str, params: &Params, response: &HttpResponse) {
        let Some(root) = &self.root else {
            return;
        };
        if !self.caches(action) {
            return;
        }

        let signature = signature_for(params);
        if !signature.is_plain_file_name() {
            warn!(action, %signature, "signature contains a path separator, response not cached");
            return;
        }
        let dir = root.join(action);
        if !dir.is_dir() {
            if let Err(e) = fs::create_dir_all(&dir) {
                error!(path = %dir.display(), error = %e, "creating cache directory failed");
                return;
            }
            debug!(path = %dir.display(), "created dir to store responses");
        }

        let body_path = dir.join(signature.file_name());
        if let Err(e) = fs::write(&body_path, &response.body) {
            error!(path = %body_path.display(), error = %e, "storing response text failed");
            error!("response text was:\n--------\n{}\n--------", response.body);
            return;
        }
        debug!(
            path = %body_path.display(),
            lines = response.body.lines().count(),
            "wrote response text"
        );

        let status_path = dir.join(signature.status_file_name());
        let result = if response.status == 200 {
            match fs::remove_file(&status_path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            fs::write(&status_path, response.status.to_string())
        };
        if let Err(e) = result {
            error!(path = %status_path.display(), error = %e, "storing status code failed");
        }
    }

    /// Delete cached responses.
    ///
    /// With `keep_users` the `getuser` directory survives and every other
    /// action directory is removed; otherwise the whole root goes.
    pub fn flush(&self, keep_users: bool) -> Result<()> {
        let Some(root) = &self.root else {
            debug!("no cache path configured, nothing to flush");
            return Ok(());
        };
        if !root.exists() {
            return Ok(());
        }

        if !keep_users {
            fs::remove_dir_all(root).map_err(|source| PpmsError::Io {
                path: root.clone(),
                source,
            })?;
            info!(root = %root.display(), "flushed response cache");
            return Ok(());
        }

        let entries = fs::read_dir(root).map_err(|source| PpmsError::Io {
            path: root.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| PpmsError::Io {
                path: root.clone(),
                source,
            })?;
            let path = entry.path();
            if entry.file_name() == KEEP_ON_FLUSH_ACTION {
                debug!(path = %path.display(), "keeping cached user details");
                continue;
            }
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|source| PpmsError::Io {
                path: path.clone(),
                source,
            })?;
        }
        info!(root = %root.display(), kept = KEEP_ON_FLUSH_ACTION, "flushed response cache");
        Ok(())
    }
}

fn read_status(path: &Path) -> std::result::Result<u16, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    text.trim().parse::<u16>().map_err(|e| format!("{e}: {text:?}"))
}
