use std::sync::atomic::{AtomicBool, Ordering};

use md5::{Digest, Md5};
use tracing::{debug, info, instrument, warn};
use tr_auth::config::endpoints;
use tr_auth::{ClientError, Credentials, Result, SessionObserver};

use crate::TreinoApi;
use crate::models::{SignInRequest, SignInResponse, User};

/// Hex-encoded MD5 digest the server stores passwords as
fn password_digest(password: &str) -> String {
    let digest = Md5::digest(password.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Session observer that remembers whether the server ended the session
///
/// Observer callbacks are synchronous, so the stored tokens cannot be removed
/// from inside them. Register a monitor, and once the work is done pass it to
/// [`TreinoApi::forget_ended_session`].
#[derive(Debug, Default)]
pub struct SessionMonitor {
    ended: AtomicBool,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl SessionObserver for SessionMonitor {
    fn sign_out(&self) {
        warn!("Session ended by the server");
        self.ended.store(true, Ordering::SeqCst);
    }

    fn on_token_refreshed(&self, _access_token: &str) {
        info!("Access token rotated");
    }
}

impl TreinoApi {
    /// Authenticate and install the returned tokens
    ///
    /// Both tokens are persisted in the client's credential store and the
    /// access token becomes the default `Authorization` header.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<User> {
        let request = SignInRequest {
            login,
            password: password_digest(password),
        };

        let response: SignInResponse = self.client.post(endpoints::SIGN_IN, &request).await?;

        let (Some(user), Some(token), Some(refresh_token)) =
            (response.user, response.token, response.refresh_token)
        else {
            return Err(ClientError::InvalidResponse(
                "Sign-in response is missing the user or its tokens".to_string(),
            ));
        };

        self.client
            .store()
            .save_credentials(&Credentials::new(token.as_str(), refresh_token))
            .await?;
        self.client.set_default_authorization_header(&token);

        info!(user = %user.login, role = %user.role, "Signed in");
        Ok(user)
    }

    /// Forget the stored tokens and stop sending the `Authorization` header
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.client.clear_default_authorization_header();
        self.client.store().clear().await?;
        info!("Signed out");
        Ok(())
    }

    /// Sign out locally if `monitor` saw the server end the session.
    /// Returns whether the stored tokens were removed.
    pub async fn forget_ended_session(&self, monitor: &SessionMonitor) -> Result<bool> {
        if !monitor.session_ended() {
            return Ok(false);
        }
        self.sign_out().await?;
        Ok(true)
    }

    /// Install a previously stored access token. Returns whether one was found.
    pub async fn restore_session(&self) -> bool {
        match self.client.store().access_token().await {
            Some(token) => {
                self.client.set_default_authorization_header(&token);
                debug!("Restored stored session");
                true
            }
            None => false,
        }
    }
}
