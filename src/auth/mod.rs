//! Auth backend client
//!
//! Talks to the external auth service (login, registration, profile, password
//! reset, Google OAuth). The bearer token lives in an explicit [`AuthSession`]
//! owned by the client instead of ambient storage.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use validator::Validate;

/// Errors from the auth client
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    Decode(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Bearer token holder with an explicit init/clear lifecycle
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    token: Option<String>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Profile returned by `GET /auth/profile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub is_google_user: bool,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Serialize, Validate)]
struct Credentials {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

/// Registration form
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Serialize, Validate)]
struct ForgotPassword {
    #[validate(email)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

/// Client for the auth backend
pub struct AuthClient {
    client: Client,
    base_url: String,
    session: RwLock<AuthSession>,
    user: RwLock<Option<User>>,
}

impl AuthClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: RwLock::new(AuthSession::new()),
            user: RwLock::new(None),
        })
    }

    /// Start from a previously issued token
    pub async fn with_token(self, token: impl Into<String>) -> Self {
        self.session.write().await.init(token);
        self
    }

    pub async fn session(&self) -> AuthSession {
        self.session.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    /// True once a profile has been loaded for the session's token
    pub async fn is_authenticated(&self) -> bool {
        self.user.read().await.is_some()
    }

    /// POST /auth/login, then try to load the profile with the issued token.
    ///
    /// The token is kept even when the profile cannot be loaded; the user is
    /// then `None` until a later [`AuthClient::profile`] succeeds.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Option<User>> {
        let creds = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        creds
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&creds)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response, "Authentication failed").await);
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        self.session.write().await.init(body.access_token.clone());
        info!("Logged in as {}", email);

        match self.fetch_profile(&body.access_token).await {
            Ok(user) => {
                *self.user.write().await = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) => {
                warn!("Profile after login unavailable: {}", e);
                Ok(None)
            }
        }
    }

    /// POST /auth/register. Does not log the user in.
    pub async fn register(&self, form: &SignUp) -> AuthResult<Option<String>> {
        form.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(form)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response, "Registration failed").await);
        }

        let body: MessageBody = response.json().await.unwrap_or_default();
        Ok(body.message)
    }

    /// GET /auth/profile. A rejected token is cleared from the session.
    pub async fn profile(&self) -> AuthResult<User> {
        let token = self
            .session
            .read()
            .await
            .token()
            .map(str::to_string)
            .ok_or(AuthError::Unauthorized)?;

        match self.fetch_profile(&token).await {
            Ok(user) => {
                *self.user.write().await = Some(user.clone());
                Ok(user)
            }
            Err(AuthError::Unauthorized) => {
                warn!("Profile request rejected, clearing session");
                self.session.write().await.clear();
                *self.user.write().await = None;
                Err(AuthError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_profile(&self, token: &str) -> AuthResult<User> {
        let response = self
            .client
            .get(format!("{}/auth/profile", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            warn!("Profile request returned {}", response.status());
            return Err(AuthError::Unauthorized);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))
    }

    /// POST /auth/forgot-password
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let req = ForgotPassword {
            email: email.to_string(),
        };
        req.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/auth/forgot-password", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response, "Failed to send password reset email").await);
        }

        Ok(())
    }

    pub async fn logout(&self) {
        self.session.write().await.clear();
        *self.user.write().await = None;
    }

    /// Where the browser is sent to start Google OAuth
    pub fn google_auth_url(&self) -> String {
        format!("{}/auth/google", self.base_url)
    }

    /// Adopt the token from an OAuth redirect fragment (`#token=...`) and
    /// load the profile with it. A fragment without a token is `Unauthorized`.
    pub async fn complete_oauth(&self, fragment: &str) -> AuthResult<User> {
        let token = token_from_fragment(fragment).ok_or(AuthError::Unauthorized)?;
        self.session.write().await.init(token);
        self.profile().await
    }
}

/// Pull `token` out of a URL fragment such as `#token=abc&state=x`
pub fn token_from_fragment(fragment: &str) -> Option<String> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Map an error response to its `{message}`, or `default` when absent
async fn rejection(response: reqwest::Response, default: &str) -> AuthError {
    warn!("Auth backend rejected request ({})", response.status());
    let body: MessageBody = response.json().await.unwrap_or_default();
    AuthError::Rejected(body.message.unwrap_or_else(|| default.to_string()))
}
