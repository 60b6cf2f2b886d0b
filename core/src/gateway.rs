//! Single choke point for every PUMAPI call.
//!
//! # Design
//! `RequestGateway` owns the session, the response cache and the transport.
//! Each call first tries the cache, falls back to an on-line POST, stores
//! what came off the wire, and then checks the body for the unauthorized
//! marker. Bodies are returned unparsed; decoding belongs to the caller.
//!
//! All mutating methods take `&mut self`. A gateway is meant for one caller
//! at a time, like the cache directory it owns.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::auth::{AuthSession, AuthState};
use crate::cache::ResponseCache;
use crate::config::ConnectionConfig;
use crate::error::{PpmsError, Result};
use crate::http::{HttpRequest, HttpResponse, Params, Transport, UreqTransport};

pub struct RequestGateway {
    session: AuthSession,
    cache: ResponseCache,
    transport: Box<dyn Transport>,
    served_from_cache: bool,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("session", &self.session)
            .field("cache", &self.cache)
            .field("served_from_cache", &self.served_from_cache)
            .finish_non_exhaustive()
    }
}

impl RequestGateway {
    /// Open a connection using the blocking `ureq` transport.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::with_transport(config, UreqTransport::new(config.timeout()))
    }

    /// Open a connection over the given transport.
    ///
    /// With a credential, authentication runs before this returns. Without
    /// one the gateway serves from the cache only, which requires a cache
    /// root.
    pub fn with_transport<T: Transport + 'static>(
        config: &ConnectionConfig,
        transport: T,
    ) -> Result<Self> {
        let session = AuthSession::new(&config.url, &config.api_key);
        let cache = ResponseCache::new(config.cache_root())
            .with_only_action(config.cache_only_action.clone());

        if session.is_offline() && !cache.is_enabled() {
            return Err(PpmsError::Configuration(
                "neither API key nor cache path given, at least one is required".to_string(),
            ));
        }

        let mut gateway = Self {
            session,
            cache,
            transport: Box::new(transport),
            served_from_cache: false,
        };

        if gateway.session.is_offline() {
            info!("no API key given, running in cache-only mode");
        } else {
            gateway.authenticate()?;
        }
        Ok(gateway)
    }

    fn authenticate(&mut self) -> Result<()> {
        self.session.begin();
        let response = self.request("auth", &Params::new())?;
        self.session.evaluate(&response)
    }

    /// Submit `action`, reading from the cache unless `skip_cache` is set.
    pub fn call(&mut self, action: &str, params: &Params, skip_cache: bool) -> Result<HttpResponse> {
        let mut form = Params::new();
        form.insert("action".to_string(), action.to_string());
        form.insert("apikey".to_string(), self.session.api_key().to_string());
        form.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let cached = if skip_cache {
            debug!(action, "skipping the cache has been requested");
            None
        } else {
            self.cache.read(action, &form)
        };
        self.served_from_cache = cached.is_some();

        let response = match cached {
            Some(response) => response,
            None => {
                debug!(action, "doing an on-line request");
                let request = HttpRequest {
                    url: self.session.url().to_string(),
                    form,
                };
                let response = self.transport.execute(&request)?;
                self.cache.write(action, &request.form, &response);
                response
            }
        };

        self.session.check_authorized(action, &response)?;
        Ok(response)
    }

    /// `call` with the cache enabled.
    pub fn request(&mut self, action: &str, params: &Params) -> Result<HttpResponse> {
        self.call(action, params, false)
    }

    /// Whether the last call was answered from the cache.
    pub fn served_from_cache(&self) -> bool {
        self.served_from_cache
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.state()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_root(&self) -> Option<&Path> {
        self.cache.root()
    }

    /// Point the cache at another directory, e.g. a snapshot taken after the
    /// remote state changed.
    pub fn set_cache_root(&mut self, root: Option<PathBuf>) {
        self.cache.set_root(root);
    }

    /// See `ResponseCache::flush`.
    pub fn flush_cache(&self, keep_users: bool) -> Result<()> {
        self.cache.flush(keep_users)
    }
}
