use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ClientConfig, endpoints};
use crate::errors::{ClientError, Result};
use crate::models::{ErrorPayload, RefreshRequest, RefreshResponse};
use crate::refresh::{RefreshState, Ticket};
use crate::session::{Credentials, InterceptorSlot, SessionHandle, SessionObserver};
use crate::store::CredentialStore;

/// HTTP client that recovers from expired access tokens
///
/// Every request carries the default `Authorization: Bearer <token>` header.
/// While session handlers are registered, a 401 response whose body code is
/// `token.expired` or `token.invalid` triggers a refresh: exactly one refresh
/// call runs per client at a time, requests failing meanwhile are queued, and
/// all of them are replayed with the new token (or rejected together if the
/// refresh fails).
///
/// The default header is shared by every clone of the client, so a client
/// instance serves one authenticated session at a time. The session observer
/// is told to sign out at most once per installed header: further failures of
/// requests sent with the same header stay silent until a new header is set.
#[derive(Clone)]
pub struct AuthenticatingHttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    http: Client,
    store: Arc<dyn CredentialStore>,
    default_auth: RwLock<DefaultAuth>,
    /// Generation + 1 of the newest header the observer was signed out for
    signed_out: AtomicU64,
    interceptor: Arc<InterceptorSlot>,
    refresh: RefreshState,
}

/// Default bearer token and how many times the header has been replaced
#[derive(Debug, Default)]
struct DefaultAuth {
    token: Option<String>,
    generation: u64,
}

/// A request that can be replayed with a different token
#[derive(Debug, Clone)]
struct PreparedRequest {
    method: Method,
    url: Url,
    body: Option<Value>,
    headers: HeaderMap,
}

/// Why a single dispatch did not yield a decoded body
#[derive(Debug)]
enum Failure {
    Transport(reqwest::Error),
    Status { status: StatusCode, body: String },
    Local(ClientError),
}

impl Failure {
    /// Error as produced by the transport, without interpretation
    fn into_raw(self) -> ClientError {
        match self {
            Self::Transport(e) => e.into(),
            Self::Status { status, body } => ClientError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            },
            Self::Local(e) => e,
        }
    }

    /// Structured server errors become [`ClientError::Api`]; everything else stays raw
    fn normalize(self) -> ClientError {
        if let Self::Status { status, body } = &self
            && let Some(payload) = ErrorPayload::parse(body)
        {
            return ClientError::Api {
                status: *status,
                code: payload.code,
                message: payload.message.unwrap_or_else(|| status.to_string()),
            };
        }
        self.into_raw()
    }

    fn unauthorized_payload(&self) -> Option<Option<ErrorPayload>> {
        match self {
            Self::Status { status, body } if *status == StatusCode::UNAUTHORIZED => {
                Some(ErrorPayload::parse(body))
            }
            _ => None,
        }
    }
}

impl AuthenticatingHttpClient {
    /// Create a new client backed by the given credential store
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("treino"))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                store,
                default_auth: RwLock::new(DefaultAuth::default()),
                signed_out: AtomicU64::new(0),
                interceptor: Arc::new(InterceptorSlot::default()),
                refresh: RefreshState::default(),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// Install the refresh interceptor with the given session observer
    ///
    /// Only one registration may be live at a time; unregister the previous
    /// handle before registering a new observer.
    pub fn register_session_handlers(
        &self,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle> {
        let handle = self.inner.interceptor.install(observer)?;
        debug!(?handle, "Session handlers registered");
        Ok(handle)
    }

    pub fn has_session_handlers(&self) -> bool {
        self.inner.interceptor.is_installed()
    }

    /// Use `Bearer <token>` for all subsequent requests
    pub fn set_default_authorization_header(&self, token: &str) {
        self.replace_default_token(Some(token.to_string()));
    }

    pub fn clear_default_authorization_header(&self) {
        self.replace_default_token(None);
    }

    /// Token currently sent in the default `Authorization` header
    pub fn default_authorization_token(&self) -> Option<String> {
        self.read_default_auth().token.clone()
    }

    fn read_default_auth(&self) -> RwLockReadGuard<'_, DefaultAuth> {
        self.inner
            .default_auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_default_auth(&self) -> RwLockWriteGuard<'_, DefaultAuth> {
        self.inner
            .default_auth
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_default_token(&self, token: Option<String>) {
        let mut auth = self.write_default_auth();
        auth.token = token;
        auth.generation += 1;
    }

    /// Tell the observer the session is over, once per header generation
    fn end_session(&self, observer: &dyn SessionObserver, generation: u64) {
        let marker = generation + 1;
        if self.inner.signed_out.fetch_max(marker, Ordering::SeqCst) < marker {
            observer.sign_out();
        } else {
            debug!("Session already ended for this header, not signing out again");
        }
    }

    /// Whether a refresh call is in flight right now
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Issue a request against a server-relative path and decode the JSON body
    ///
    /// An empty success body decodes to [`Value::Null`].
    #[instrument(skip(self, method, body, headers), fields(method = %method))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value> {
        let request = PreparedRequest {
            method,
            url: self.url_for(path)?,
            body,
            headers: headers.unwrap_or_default(),
        };

        let (default_token, generation) = {
            let auth = self.read_default_auth();
            (auth.token.clone(), auth.generation)
        };
        let sent_token = if request.headers.contains_key(AUTHORIZATION) {
            None
        } else {
            default_token
        };

        let failure = match self.dispatch(&request, sent_token.as_deref()).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        match self.inner.interceptor.observer() {
            Some(observer) => {
                self.intercept(&request, sent_token, generation, failure, observer)
                    .await
            }
            None => Err(failure.into_raw()),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        decode(self.request(Method::GET, path, None, None).await?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        decode(self.request(Method::POST, path, Some(body), None).await?)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        decode(self.request(Method::PUT, path, Some(body), None).await?)
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        decode(self.request(Method::PATCH, path, Some(body), None).await?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        decode(self.request(Method::DELETE, path, None, None).await?)
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        if !path.starts_with('/') || path.starts_with("//") {
            return Err(ClientError::InvalidPath(path.to_string()));
        }

        let base = self.inner.config.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    /// Send once, bypassing the interceptor
    async fn dispatch(
        &self,
        request: &PreparedRequest,
        token: Option<&str>,
    ) -> std::result::Result<Value, Failure> {
        let mut headers = request.headers.clone();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                Failure::Local(ClientError::InvalidResponse(
                    "Access token is not a valid header value".to_string(),
                ))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Failure::Transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(Failure::Transport)?;

        if !status.is_success() {
            return Err(Failure::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| Failure::Local(e.into()))
    }

    async fn intercept(
        &self,
        request: &PreparedRequest,
        sent_token: Option<String>,
        generation: u64,
        failure: Failure,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Value> {
        if let Some(payload) = failure.unauthorized_payload() {
            if payload.as_ref().is_some_and(ErrorPayload::is_token_failure) {
                return self
                    .recover(request, sent_token, generation, failure, observer)
                    .await;
            }

            // Not a token problem, but the session is no longer accepted. The
            // caller still receives the normalized error below.
            warn!(url = %request.url, "Unauthorized without token error code, signing out");
            self.end_session(observer.as_ref(), generation);
        }

        Err(failure.normalize())
    }

    async fn recover(
        &self,
        request: &PreparedRequest,
        sent_token: Option<String>,
        generation: u64,
        failure: Failure,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Value> {
        let Some(refresh_token) = self.inner.store.refresh_token().await else {
            warn!("Access token rejected and no refresh token stored, signing out");
            self.end_session(observer.as_ref(), generation);
            return Err(failure.into_raw());
        };

        // A refresh settled between sending this request and reading its failure
        if let Some(sent) = sent_token.as_deref()
            && let Some(current) = self.default_authorization_token()
            && current != sent
        {
            debug!("Access token already rotated, replaying request");
            return self.retry(request, &current).await;
        }

        match self.inner.refresh.begin() {
            Ticket::Follower(waiter) => {
                debug!(
                    queued = self.inner.refresh.pending_len(),
                    "Refresh in flight, queueing request"
                );
                let token = waiter.await.map_err(|_| ClientError::RefreshAborted)??;
                self.retry(request, &token).await
            }
            Ticket::Leader(lease) => {
                info!("Access token expired, refreshing");
                match self.rotate(&refresh_token, observer.as_ref()).await {
                    Ok(token) => {
                        let released = lease.settle(&Ok(token.clone()));
                        debug!(released, "Token refreshed, replaying queued requests");
                        self.retry(request, &token).await
                    }
                    Err(e) => {
                        let released = lease.settle(&Err(e.clone()));
                        warn!(error = %e, released, "Token refresh failed, signing out");
                        self.end_session(observer.as_ref(), generation);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Exchange the refresh token, persist the new pair and install the new access token
    async fn rotate(&self, refresh_token: &str, observer: &dyn SessionObserver) -> Result<String> {
        let timeout = self.inner.config.refresh_timeout;
        let response = tokio::time::timeout(timeout, self.call_refresh(refresh_token))
            .await
            .map_err(|_| ClientError::RefreshTimeout(timeout))??;

        self.inner
            .store
            .save_credentials(&Credentials::new(
                response.token.as_str(),
                response.refresh_token.as_str(),
            ))
            .await?;

        self.set_default_authorization_header(&response.token);
        observer.on_token_refreshed(&response.token);

        Ok(response.token)
    }

    async fn call_refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let request = PreparedRequest {
            method: Method::POST,
            url: self.url_for(endpoints::REFRESH)?,
            body: Some(serde_json::to_value(RefreshRequest { refresh_token })?),
            headers: HeaderMap::new(),
        };

        let value = self
            .dispatch(&request, None)
            .await
            .map_err(Failure::normalize)?;

        serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("Malformed refresh response: {}", e)))
    }

    /// Replay with an explicit token; a failing replay never starts another refresh
    async fn retry(&self, request: &PreparedRequest, token: &str) -> Result<Value> {
        self.dispatch(request, Some(token))
            .await
            .map_err(Failure::normalize)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

impl fmt::Debug for AuthenticatingHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatingHttpClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("has_session_handlers", &self.has_session_handlers())
            .field("is_refreshing", &self.is_refreshing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    fn client() -> AuthenticatingHttpClient {
        let config = ClientConfig::with_base_url("http://localhost:3333/api").unwrap();
        AuthenticatingHttpClient::new(config, Arc::new(MemoryCredentialStore::new())).unwrap()
    }

    #[test]
    fn test_url_for_appends_to_base_path() {
        let client = client();
        assert_eq!(
            client.url_for("/student/all").unwrap().as_str(),
            "http://localhost:3333/api/student/all"
        );
    }

    #[test]
    fn test_url_for_rejects_non_relative_paths() {
        let client = client();
        for path in ["student/all", "//evil.example.com/x", "http://evil.example.com/x", ""] {
            assert!(
                matches!(client.url_for(path), Err(ClientError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_header_is_shared_between_clones() {
        let client = client();
        let other = client.clone();

        client.set_default_authorization_header("T1");
        assert_eq!(other.default_authorization_token().as_deref(), Some("T1"));

        other.clear_default_authorization_header();
        assert!(client.default_authorization_token().is_none());
    }

    #[test]
    fn test_normalize_structured_body() {
        let failure = Failure::Status {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"message":"Student not found"}"#.to_string(),
        };
        match failure.normalize() {
            ClientError::Api {
                status, message, ..
            } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Student not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_plain_body_stays_raw() {
        let failure = Failure::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "x".repeat(500),
        };
        match failure.normalize() {
            ClientError::Http {
                status,
                body_snippet,
            } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body_snippet.len(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let client = client();
        client.set_default_authorization_header("super-secret");
        assert!(!format!("{:?}", client).contains("super-secret"));
    }
}
