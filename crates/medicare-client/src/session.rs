use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use medicare_types::api::AuthResponse;
use medicare_types::models::User;

use crate::backend::CareBackend;
use crate::error::{ClientError, Result};
use crate::local_store::{CachedProfile, LocalStore, PROFILE_KEY, SESSION_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl From<AuthResponse> for Session {
    fn from(resp: AuthResponse) -> Self {
        Self {
            user: resp.user,
            token: resp.token,
            expires_at: resp.expires_at,
        }
    }
}

/// Owns the signed-in session. Views hold a [`watch::Receiver`] and never
/// change it themselves: only sign-in, sign-up and sign-out do.
pub struct SessionStore {
    store: LocalStore,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// Restore the persisted session, if any and not expired.
    pub fn init(store: LocalStore) -> Result<Self> {
        let session = match store.get::<Session>(SESSION_KEY)? {
            Some(session) if session.is_expired() => {
                debug!("Discarding expired session for {}", session.user.email);
                store.remove(SESSION_KEY)?;
                store.remove(PROFILE_KEY)?;
                None
            }
            other => other,
        };
        let (tx, _) = watch::channel(session);
        Ok(Self { store, tx })
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.store
    }

    /// Adopt a fresh session after sign-in or sign-up.
    pub fn establish(&self, resp: AuthResponse) -> Result<Session> {
        let session = Session::from(resp);
        self.store.set(SESSION_KEY, &session)?;
        self.store.set(PROFILE_KEY, &CachedProfile::from(&session.user))?;
        info!("Signed in as {} ({})", session.user.email, session.user.role);
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Re-validate the stored session against the server. A rejected token
    /// tears the session down and yields `None`.
    pub async fn refresh(&self, backend: &dyn CareBackend) -> Result<Option<Session>> {
        let Some(mut session) = self.current() else {
            return Ok(None);
        };
        backend.set_token(Some(session.token.clone()));

        match backend.current_session().await {
            Ok(resp) => {
                session.user = resp.user;
                session.expires_at = resp.expires_at;
                self.store.set(SESSION_KEY, &session)?;
                self.store.set(PROFILE_KEY, &CachedProfile::from(&session.user))?;
                self.tx.send_replace(Some(session.clone()));
                Ok(Some(session))
            }
            Err(ClientError::Unauthorized) => {
                backend.set_token(None);
                self.teardown()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Sign out on the server, then forget everything locally even if the
    /// server call failed.
    pub async fn sign_out(&self, backend: &dyn CareBackend) -> Result<()> {
        let result = backend.sign_out().await;
        self.teardown()?;
        result
    }

    /// Forget the session, its persisted blob and the cached profile.
    pub fn teardown(&self) -> Result<()> {
        self.store.remove(SESSION_KEY)?;
        self.store.remove(PROFILE_KEY)?;
        if self.tx.send_replace(None).is_some() {
            info!("Signed out");
        }
        Ok(())
    }
}
