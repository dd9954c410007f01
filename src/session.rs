//! Session manager
//!
//! Owns the single authenticated vSphere session of the process. The session is
//! opened lazily, re-validated on every use and replaced when the probe fails.
//! All state transitions happen under one async mutex, so at most one
//! reconnect is in flight and callers never see a half-replaced session.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::error::SessionError;
use crate::vsphere::{Session, VimClient};

/// Property of the session manager fetched to prove the session is alive
const PROBE_PROPERTY: &str = "currentSession";

/// Lazily connecting, self-healing holder of the upstream session
pub struct SessionManager {
    connection: ConnectionConfig,
    current: Mutex<Option<Arc<Session>>>,
}

impl SessionManager {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            current: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Return a live session, reusing the current one when it still validates
    ///
    /// Otherwise the old session is torn down (logout failures only warn) and
    /// exactly one new login is attempted. No retry on failure.
    pub async fn ensure_connected(&self) -> Result<Arc<Session>, SessionError> {
        let mut current = self.current.lock().await;

        if let Some(session) = current.as_ref() {
            match probe(session).await {
                Ok(()) => {
                    info!(endpoint = %self.connection.endpoint, "Reusing vSphere session");
                    return Ok(Arc::clone(session));
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.connection.endpoint,
                        error = %e,
                        "vSphere session failed validation, reconnecting"
                    );
                }
            }
        }

        clear(&mut current).await;

        let session = Arc::new(self.connect().await?);
        *current = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Probe the stored session without replacing it
    pub async fn validate(&self) -> Result<(), SessionError> {
        let current = self.current.lock().await;
        match current.as_ref() {
            Some(session) => probe(session).await,
            None => Err(SessionError::Invalid("no session".to_string())),
        }
    }

    /// Log out (best effort) and drop the stored session
    pub async fn teardown(&self) {
        let mut current = self.current.lock().await;
        clear(&mut current).await;
    }

    /// Whether a session is currently stored (it may still fail validation)
    pub async fn is_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }

    async fn connect(&self) -> Result<Session, SessionError> {
        let client = VimClient::new(&self.connection).map_err(SessionError::Connection)?;
        let (content, cookie) = client
            .retrieve_service_content()
            .await
            .map_err(SessionError::Connection)?;
        let session = client
            .login(
                content,
                cookie,
                &self.connection.username,
                &self.connection.password,
            )
            .await
            .map_err(SessionError::Connection)?;

        let about = &session.content().about;
        info!(
            endpoint = %self.connection.endpoint,
            product = %about.full_name,
            api_version = %about.api_version,
            "Connected to vSphere"
        );
        Ok(session)
    }
}

async fn probe(session: &Session) -> Result<(), SessionError> {
    let session_manager = &session.content().session_manager;
    match session.retrieve_property(session_manager, PROBE_PROPERTY).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(SessionError::Invalid(format!("{} is unset", PROBE_PROPERTY))),
        Err(e) => Err(SessionError::Invalid(e.to_string())),
    }
}

async fn clear(slot: &mut Option<Arc<Session>>) {
    if let Some(session) = slot.take() {
        if let Err(e) = session.logout().await {
            warn!(endpoint = %session.endpoint(), error = %e, "vSphere logout failed");
        }
    }
}
