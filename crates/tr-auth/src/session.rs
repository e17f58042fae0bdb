use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Result};

/// Access and refresh token pair for the signed-in user
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Host-application hooks for session lifecycle events
///
/// `sign_out` is called when the session can no longer be recovered: the
/// refresh token is missing, the refresh call failed, or the server answered
/// 401 without a token error code. It fires once for the header the failing
/// requests were sent with, however many of them fail concurrently, and again
/// only after a new default header has been installed.
///
/// `on_token_refreshed` is called after a successful rotation, once the new
/// tokens are persisted and installed as the default header.
pub trait SessionObserver: Send + Sync {
    fn sign_out(&self);

    fn on_token_refreshed(&self, access_token: &str);
}

/// Closure-backed [`SessionObserver`]
pub struct SessionCallbacks<S, R> {
    on_sign_out: S,
    on_token_rotated: R,
}

impl<S, R> SessionCallbacks<S, R>
where
    S: Fn() + Send + Sync + 'static,
    R: Fn(&str) + Send + Sync + 'static,
{
    pub fn new(on_sign_out: S, on_token_rotated: R) -> Self {
        Self {
            on_sign_out,
            on_token_rotated,
        }
    }
}

impl<S, R> SessionObserver for SessionCallbacks<S, R>
where
    S: Fn() + Send + Sync + 'static,
    R: Fn(&str) + Send + Sync + 'static,
{
    fn sign_out(&self) {
        (self.on_sign_out)()
    }

    fn on_token_refreshed(&self, access_token: &str) {
        (self.on_token_rotated)(access_token)
    }
}

struct Registration {
    id: u64,
    observer: Arc<dyn SessionObserver>,
}

/// Holds the single installed session observer for one client
#[derive(Default)]
pub(crate) struct InterceptorSlot {
    current: Mutex<Option<Registration>>,
    next_id: AtomicU64,
}

impl InterceptorSlot {
    pub(crate) fn install(
        self: &Arc<Self>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() {
            return Err(ClientError::HandlersAlreadyRegistered);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *current = Some(Registration { id, observer });

        Ok(SessionHandle {
            id,
            slot: Arc::downgrade(self),
            active: AtomicBool::new(true),
        })
    }

    /// Observer of the live registration, if any
    pub(crate) fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| Arc::clone(&r.observer))
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn eject(&self, id: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|r| r.id == id) {
            *current = None;
        }
    }
}

/// Returned by [`register_session_handlers`](crate::AuthenticatingHttpClient::register_session_handlers)
///
/// Dropping the handle does not unregister; call [`unregister`](Self::unregister).
#[must_use = "the handlers stay installed until `unregister` is called"]
pub struct SessionHandle {
    id: u64,
    slot: Weak<InterceptorSlot>,
    active: AtomicBool,
}

impl SessionHandle {
    /// Remove the interceptor. Later calls are no-ops.
    pub fn unregister(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(slot) = self.slot.upgrade() {
            slot.eject(self.id);
            tracing::debug!(registration = self.id, "Session handlers unregistered");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
