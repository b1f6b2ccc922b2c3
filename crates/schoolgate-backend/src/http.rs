//! Hosted-service implementation of [`BackendClient`] using `reqwest`.
//!
//! Talks to the backend-as-a-service over its two HTTP surfaces: the
//! auth gateway (`/auth/v1/*`) for identity operations and the row
//! gateway (`/rest/v1/*`) for profile reads and writes. The access
//! token lives inside this client and is never projected outward;
//! token refresh and invalidation are the service's business.

use std::sync::Mutex;

use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use schoolgate_model::{
    AuthChange, AuthEventKind, NewProfile, Profile, Session, UserId,
};

use crate::{BackendClient, BackendError};

/// Capacity of the auth-change broadcast channel.
///
/// A subscriber that falls more than this many events behind sees a
/// `Lagged` error and resynchronizes on the next event, which for a
/// session projection is always safe (later events supersede earlier
/// ones).
const AUTH_CHANNEL_CAPACITY: usize = 32;

/// A [`BackendClient`] backed by the hosted service's HTTP API.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// The current access token and its session, if signed in.
    /// Guarded by a sync mutex: it is only touched between awaits.
    auth: Mutex<Option<StoredAuth>>,
    changes: broadcast::Sender<AuthChange>,
}

#[derive(Debug, Clone)]
struct StoredAuth {
    access_token: String,
    session: Session,
}

// -- Response bodies --------------------------------------------------------

/// Successful body from `/auth/v1/token` and `/auth/v1/signup`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserBody,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: String,
}

/// Error body from the auth gateway. Field names vary by endpoint, so
/// every one is optional and [`AuthErrorBody::into_message`] picks the
/// first populated one.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self, status: reqwest::StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .unwrap_or_else(|| format!("request rejected with status {status}"))
    }
}

impl HttpBackend {
    /// Creates a client for the service at `base_url`.
    ///
    /// `api_key` is the public (anon) key sent with every request; the
    /// per-user bearer token is added once a principal signs in.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let (changes, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            auth: Mutex::new(None),
            changes,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Option<String> {
        self.auth
            .lock()
            .expect("auth lock poisoned")
            .as_ref()
            .map(|a| a.access_token.clone())
    }

    fn store_auth(&self, token: TokenResponse) -> Session {
        let session = Session {
            user_id: UserId(token.user.id),
            email: token.user.email,
        };
        *self.auth.lock().expect("auth lock poisoned") = Some(StoredAuth {
            access_token: token.access_token,
            session: session.clone(),
        });
        let _ = self.changes.send(AuthChange {
            kind: AuthEventKind::SignedIn,
            session: Some(session.clone()),
        });
        session
    }

    fn clear_auth(&self) {
        *self.auth.lock().expect("auth lock poisoned") = None;
        let _ = self.changes.send(AuthChange {
            kind: AuthEventKind::SignedOut,
            session: None,
        });
    }

    /// Runs a credential call against the auth gateway and maps the
    /// response: 2xx → token stored + `SignedIn` broadcast, 5xx →
    /// `Unavailable`, other statuses → `Rejected` with the service's
    /// own message.
    async fn credential_call(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if status.is_success() {
            let token: TokenResponse = resp
                .json()
                .await
                .map_err(|e| BackendError::Malformed(e.to_string()))?;
            Ok(self.store_auth(token))
        } else {
            Err(classify_status(status, resp).await)
        }
    }
}

impl BackendClient for HttpBackend {
    async fn probe_health(&self) -> Result<(), BackendError> {
        let resp = self
            .http
            .get(self.endpoint("/auth/v1/health"))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(classify_transport)?;

        // Any non-5xx answer proves the path to the service works:
        // even a 401 means the request arrived and was processed.
        let status = resp.status();
        if status.is_server_error() {
            return Err(BackendError::Unavailable {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn fetch_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(token) = self.bearer() else {
            return Ok(None);
        };

        // Validate the stored token against the service rather than
        // trusting the local copy: a revoked token must read as
        // "nobody is signed in", not as a live session.
        let resp = self
            .http
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("stored token no longer valid, clearing local auth");
            *self.auth.lock().expect("auth lock poisoned") = None;
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(BackendError::Unavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(classify_status(status, resp).await);
        }

        let user: UserBody = resp
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(Some(Session {
            user_id: UserId(user.id),
            email: user.email,
        }))
    }

    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.credential_call("/auth/v1/signup", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), BackendError> {
        self.credential_call("/auth/v1/token?grant_type=password", email, password)
            .await
            .map(|_| ())
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self.bearer();
        // Local sign-out happens unconditionally and first: the session
        // projection must clear even when the revocation call below
        // never reaches the service.
        self.clear_auth();

        let Some(token) = token else { return Ok(()) };
        let resp = self
            .http
            .post(self.endpoint("/auth/v1/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(BackendError::Unavailable {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn fetch_profile(
        &self,
        user_id: &UserId,
        abort: CancellationToken,
    ) -> Result<Option<Profile>, BackendError> {
        let mut request = self
            .http
            .get(self.endpoint("/rest/v1/profiles"))
            .header("apikey", &self.api_key)
            .query(&[("id", format!("eq.{user_id}")), ("limit", "1".into())]);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        let fetch = async move {
            let resp = request.send().await.map_err(classify_transport)?;
            let status = resp.status();
            if status.is_server_error() {
                return Err(BackendError::Unavailable {
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(classify_status(status, resp).await);
            }
            let rows: Vec<Profile> = resp
                .json()
                .await
                .map_err(|e| BackendError::Malformed(e.to_string()))?;
            Ok(rows.into_iter().next())
        };

        tokio::select! {
            result = fetch => result,
            _ = abort.cancelled() => {
                tracing::debug!(%user_id, "profile fetch aborted by caller");
                Err(BackendError::Unreachable("profile fetch aborted".into()))
            }
        }
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<(), BackendError> {
        let mut request = self
            .http
            .post(self.endpoint("/rest/v1/profiles"))
            .header("apikey", &self.api_key)
            .json(&profile.into_row());
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(classify_transport)?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(BackendError::Unavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(classify_status(status, resp).await);
        }
        Ok(())
    }
}

/// Maps a transport-level `reqwest` failure to a [`BackendError`].
fn classify_transport(e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Malformed(e.to_string())
    } else {
        BackendError::Unreachable(e.to_string())
    }
}

/// Maps a non-success, non-5xx response to [`BackendError::Rejected`],
/// extracting the service's message and code from the body when present.
async fn classify_status(
    status: reqwest::StatusCode,
    resp: reqwest::Response,
) -> BackendError {
    let body: AuthErrorBody = resp.json().await.unwrap_or_default();
    BackendError::Rejected {
        code: body.error_code.clone(),
        message: body.into_message(status),
    }
}
