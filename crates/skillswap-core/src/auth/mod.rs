//! Auth Gateway Module
//!
//! Email/password accounts against an identity-toolkit style endpoint:
//! `POST {auth_url}/accounts:signUp` and `POST {auth_url}/accounts:signInWithPassword`,
//! both with `{email, password, returnSecureToken: true}` and the API key as
//! the `key` query parameter.

mod accounts;

pub use accounts::{Accounts, Session, SignUpForm};

use crate::error::{Action, CoreError, Result};
use serde::Deserialize;
use serde_json::json;
use skillswap_http::types::Method;
use skillswap_http::{StoreClient, StoreError, StoreRequest, StoreResponse};
use tracing::{debug, info, warn};

/// Which auth endpoint was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
}

impl AuthAction {
    fn endpoint(&self) -> &'static str {
        match self {
            AuthAction::SignIn => "accounts:signInWithPassword",
            AuthAction::SignUp => "accounts:signUp",
        }
    }

    fn as_action(&self) -> Action {
        match self {
            AuthAction::SignIn => Action::Login,
            AuthAction::SignUp => Action::SignUp,
        }
    }
}

/// A rejection reported by the auth gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    InvalidCredential,
    UserDisabled,
    TooManyAttempts,
    Other { action: AuthAction, message: String },
}

impl AuthRejection {
    /// Classify the gateway's `error.message`. Messages may carry a
    /// ` : detail` suffix, which is ignored.
    pub fn classify(action: AuthAction, message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or_default().trim();
        match code {
            "INVALID_CREDENTIAL"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_PASSWORD"
            | "EMAIL_NOT_FOUND" => AuthRejection::InvalidCredential,
            "USER_DISABLED" => AuthRejection::UserDisabled,
            c if c.starts_with("TOO_MANY_ATTEMPTS") => AuthRejection::TooManyAttempts,
            _ => AuthRejection::Other {
                action,
                message: message.to_string(),
            },
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AuthRejection::InvalidCredential => "Invalid email or password.".to_string(),
            AuthRejection::UserDisabled => "This account has been disabled.".to_string(),
            AuthRejection::TooManyAttempts => {
                "Too many attempts. Please try again later.".to_string()
            }
            AuthRejection::Other {
                action: AuthAction::SignIn,
                ..
            } => "Login failed. Please check your credentials.".to_string(),
            AuthRejection::Other {
                action: AuthAction::SignUp,
                message,
            } => {
                if message.is_empty() {
                    "Signup failed. Please check your API key restrictions.".to_string()
                } else {
                    message.clone()
                }
            }
        }
    }
}

/// Successful sign-in or sign-up.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(rename = "localId")]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds, as a decimal string.
    #[serde(default)]
    pub expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the auth gateway.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    client: StoreClient,
    auth_url: String,
    api_key: String,
}

impl AuthGateway {
    /// `client` only supplies the transport; requests go to `auth_url`.
    pub fn new(client: StoreClient, auth_url: &str, api_key: &str) -> Self {
        Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.call(AuthAction::SignUp, email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.call(AuthAction::SignIn, email, password).await
    }

    async fn call(&self, action: AuthAction, email: &str, password: &str) -> Result<AuthSession> {
        let url = format!("{}/{}", self.auth_url, action.endpoint());
        let mut request = StoreRequest::json(
            Method::Post,
            &json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )?;
        if !self.api_key.is_empty() {
            request = request.with_query("key", self.api_key.as_str());
        }

        debug!("[Auth] {} for {}", action.endpoint(), email);
        let response = self
            .client
            .fetch_url(&url, request)
            .await
            .map_err(|e| CoreError::during(action.as_action(), e))?;

        if !response.is_success() {
            return Err(rejection(action, &response));
        }

        let session: AuthSession = response
            .json()
            .map_err(|e| CoreError::MalformedPayload(format!("auth response: {}", e)))?;
        info!("[Auth] {:?} succeeded for user {}", action, session.user_id);
        Ok(session)
    }
}

fn rejection(action: AuthAction, response: &StoreResponse) -> CoreError {
    match response.json::<ErrorEnvelope>() {
        Ok(envelope) => {
            let rejection = AuthRejection::classify(action, &envelope.error.message);
            warn!(
                "[Auth] {:?} rejected ({}): {:?}",
                action, response.status, rejection
            );
            CoreError::Auth(rejection)
        }
        Err(_) => CoreError::during(
            action.as_action(),
            StoreError::Status {
                status: response.status,
                body: response.body_str().unwrap_or_default().to_string(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_family() {
        for code in [
            "INVALID_CREDENTIAL",
            "INVALID_LOGIN_CREDENTIALS",
            "INVALID_PASSWORD",
            "EMAIL_NOT_FOUND",
        ] {
            let rejection = AuthRejection::classify(AuthAction::SignIn, code);
            assert_eq!(rejection, AuthRejection::InvalidCredential);
            assert_eq!(rejection.user_message(), "Invalid email or password.");
        }
    }

    #[test]
    fn test_suffix_is_ignored() {
        let rejection = AuthRejection::classify(
            AuthAction::SignIn,
            "TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled",
        );
        assert_eq!(rejection, AuthRejection::TooManyAttempts);
        assert_eq!(
            rejection.user_message(),
            "Too many attempts. Please try again later."
        );
    }

    #[test]
    fn test_disabled() {
        let rejection = AuthRejection::classify(AuthAction::SignIn, "USER_DISABLED");
        assert_eq!(rejection.user_message(), "This account has been disabled.");
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        let sign_in = AuthRejection::classify(AuthAction::SignIn, "OPERATION_NOT_ALLOWED");
        assert_eq!(
            sign_in.user_message(),
            "Login failed. Please check your credentials."
        );

        let sign_up = AuthRejection::classify(AuthAction::SignUp, "EMAIL_EXISTS");
        assert_eq!(sign_up.user_message(), "EMAIL_EXISTS");
    }
}
