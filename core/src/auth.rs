//! Authentication state for a PUMAPI session.
//!
//! # Design
//! PUMAPI answers with HTTP 200 even when it refuses a request, so the
//! session judges responses by their text. The `auth` handshake fails hard
//! when the body mentions an error, fails as "unknown" when the status is
//! not 2xx, and succeeds otherwise. Every later response is scanned for the
//! "request not authorized" marker as well, since PUMAPI can refuse single
//! actions in the middle of an otherwise good session.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::error::{PpmsError, Result};
use crate::http::HttpResponse;

/// Substring (lowercase) PUMAPI uses to refuse a request.
pub const UNAUTHORIZED_MARKER: &str = "request not authorized";

const ERROR_MARKER: &str = "error";

/// Where a session stands with respect to authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    NotAttempted,
    Attempting,
    Good,
    Failed,
    FailedError,
    FailedUnknown,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthState::NotAttempted => "not_attempted",
            AuthState::Attempting => "attempting",
            AuthState::Good => "good",
            AuthState::Failed => "failed",
            AuthState::FailedError => "failed_error",
            AuthState::FailedUnknown => "failed_unknown",
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            AuthState::Failed | AuthState::FailedError | AuthState::FailedUnknown
        )
    }

    pub fn is_terminal(self) -> bool {
        self == AuthState::Good || self.is_failed()
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint, credential and authentication outcome of one connection.
#[derive(Clone, Default)]
pub struct AuthSession {
    url: String,
    api_key: String,
    state: AuthState,
    auth_response: Option<String>,
    auth_http_status: Option<u16>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("url", &self.url)
            .field("api_key", &self.masked_key())
            .field("state", &self.state)
            .field("auth_response", &self.auth_response)
            .field("auth_http_status", &self.auth_http_status)
            .finish()
    }
}

impl AuthSession {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            ..Self::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The credential reduced to its first and last two characters.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let head: String = chars.iter().take(2).collect();
        let tail: String = chars[chars.len().saturating_sub(2)..].iter().collect();
        format!("{head}...{tail}")
    }

    /// Without a credential the session runs against the cache only.
    pub fn is_offline(&self) -> bool {
        self.api_key.is_empty()
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Raw body of the `auth` response, once one has been evaluated.
    pub fn auth_response(&self) -> Option<&str> {
        self.auth_response.as_deref()
    }

    pub fn auth_http_status(&self) -> Option<u16> {
        self.auth_http_status
    }

    pub(crate) fn begin(&mut self) {
        debug!(url = %self.url, key = %self.masked_key(), "attempting authentication");
        self.state = AuthState::Attempting;
    }

    /// Judge the response to the `auth` action.
    pub fn evaluate(&mut self, response: &HttpResponse) -> Result<()> {
        debug!(body = %response.body, "authenticate response");
        self.auth_response = Some(response.body.clone());
        self.auth_http_status = Some(response.status);

        if response.body.to_lowercase().contains(ERROR_MARKER) {
            self.state = AuthState::FailedError;
            let msg = format!("authentication failed with an error: {}", response.body);
            error!("{msg}");
            return Err(PpmsError::Connectivity(msg));
        }

        if !response.is_success() {
            warn!(
                status = response.status,
                body = %response.body,
                "unexpected combination of response and status code, assuming authentication failed"
            );
            self.state = AuthState::FailedUnknown;
            let msg = format!(
                "authenticating against {} with key [{}] FAILED",
                self.url,
                self.masked_key()
            );
            error!("{msg}");
            return Err(PpmsError::Connectivity(msg));
        }

        info!(body = %response.body, "authentication succeeded");
        debug!(status = response.status, "HTTP status");
        self.state = AuthState::Good;
        Ok(())
    }

    /// Fail and mark the session when a response refuses `action`.
    pub fn check_authorized(&mut self, action: &str, response: &HttpResponse) -> Result<()> {
        if response.body.to_lowercase().contains(UNAUTHORIZED_MARKER) {
            self.state = AuthState::Failed;
            let msg = format!("not authorized to run action `{action}`");
            error!("{msg}");
            return Err(PpmsError::Connectivity(msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession::new("https://ppms.example/pumapi/", "abcdefgh")
    }

    #[test]
    fn new_session_has_not_attempted() {
        let s = session();
        assert_eq!(s.state(), AuthState::NotAttempted);
        assert!(s.auth_response().is_none());
        assert!(!s.state().is_terminal());
    }

    #[test]
    fn good_body_with_200_is_good() {
        let mut s = session();
        s.begin();
        assert_eq!(s.state(), AuthState::Attempting);
        s.evaluate(&HttpResponse::ok("request authorized")).unwrap();
        assert_eq!(s.state(), AuthState::Good);
        assert_eq!(s.auth_http_status(), Some(200));
        assert_eq!(s.auth_response(), Some("request authorized"));
    }

    #[test]
    fn error_text_wins_over_status() {
        let mut s = session();
        let err = s.evaluate(&HttpResponse::ok("Error: invalid key")).unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(s.state(), AuthState::FailedError);
    }

    #[test]
    fn non_2xx_without_error_text_is_unknown() {
        let mut s = session();
        let err = s
            .evaluate(&HttpResponse {
                status: 503,
                body: "maintenance".into(),
            })
            .unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(s.state(), AuthState::FailedUnknown);
        assert!(s.state().is_terminal());
    }

    #[test]
    fn unauthorized_marker_fails_session_mid_way() {
        let mut s = session();
        s.evaluate(&HttpResponse::ok("ok")).unwrap();
        s.check_authorized("getusers", &HttpResponse::ok("alice\nbob\n")).unwrap();
        assert_eq!(s.state(), AuthState::Good);

        let err = s
            .check_authorized("setright", &HttpResponse::ok("Request Not Authorized!"))
            .unwrap_err();
        assert!(err.to_string().contains("setright"));
        assert_eq!(s.state(), AuthState::Failed);
    }

    #[test]
    fn key_is_masked() {
        assert_eq!(session().masked_key(), "ab...gh");
        assert_eq!(AuthSession::new("u", "x").masked_key(), "x...x");
        assert_eq!(AuthSession::new("u", "").masked_key(), "...");
        let debug = format!("{:?}", session());
        assert!(!debug.contains("abcdefgh"));
    }

    #[test]
    fn state_names() {
        assert_eq!(AuthState::FailedUnknown.to_string(), "failed_unknown");
        assert!(AuthState::Failed.is_failed());
        assert!(!AuthState::Good.is_failed());
    }
}
