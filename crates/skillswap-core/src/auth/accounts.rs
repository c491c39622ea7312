use super::{AuthGateway, AuthSession};
use crate::error::{Action, CoreError, Result};
use crate::models::{decode_record, UserProfile};
use crate::store;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use skillswap_http::StoreClient;
use tracing::{info, warn};

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

const MISSING_FIELDS: &str =
    "Please fill out all required fields, including at least one skill in each category.";
const INVALID_EMAIL: &str = "Please enter a valid email address (e.g., abc@example.com).";
const PASSWORD_MISMATCH: &str = "Password and Confirm Password must be the same.";
const MISSING_LOGIN: &str = "Please enter both email and password.";

/// Everything the registration screen collects.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub national_id: String,
    pub contact: String,
    pub location: String,
    pub password: String,
    pub confirm_password: String,
    /// Already copied into the profile image directory.
    pub image: String,
    pub availability: String,
    pub skills_have: Vec<String>,
    pub skills_learn: Vec<String>,
}

impl SignUpForm {
    /// Check the form locally and build the profile it describes.
    pub fn validate(&self) -> Result<UserProfile> {
        let skills_have = non_blank(&self.skills_have);
        let skills_learn = non_blank(&self.skills_learn);

        let required = [
            &self.name,
            &self.email,
            &self.national_id,
            &self.contact,
            &self.location,
            &self.password,
            &self.confirm_password,
            &self.image,
            &self.availability,
        ];
        if required.iter().any(|field| field.trim().is_empty())
            || skills_have.is_empty()
            || skills_learn.is_empty()
        {
            return Err(CoreError::Validation(MISSING_FIELDS.into()));
        }
        if !EMAIL_REGEX.is_match(&self.email) {
            return Err(CoreError::Validation(INVALID_EMAIL.into()));
        }
        if self.password != self.confirm_password {
            return Err(CoreError::Validation(PASSWORD_MISMATCH.into()));
        }

        Ok(UserProfile {
            name: self.name.clone(),
            email: self.email.clone(),
            location: self.location.clone(),
            contact: self.contact.clone(),
            national_id: self.national_id.clone(),
            availability: self.availability.clone(),
            skills_have: Some(skills_have),
            skills_learn: Some(skills_learn),
            image: Some(self.image.clone()),
        })
    }
}

fn non_blank(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect()
}

/// A signed-in user with their stored profile.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub auth: AuthSession,
    pub profile: UserProfile,
}

/// Login and registration flows.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: StoreClient,
    auth: AuthGateway,
}

impl Accounts {
    pub fn new(store: StoreClient, auth: AuthGateway) -> Self {
        Self { store, auth }
    }

    /// Sign in, then require a stored profile for the account.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(CoreError::Validation(MISSING_LOGIN.into()));
        }

        let auth = self.auth.sign_in(email.trim(), password).await?;

        let path = store::user(&auth.user_id);
        let raw: Option<Value> = self
            .store
            .get_json(&path)
            .await
            .map_err(|e| CoreError::during(Action::Login, e))?;
        let profile = raw
            .and_then(|value| decode_record::<UserProfile>(store::USERS, &auth.user_id, value))
            .ok_or_else(|| {
                warn!("[Auth] No profile stored for {}", auth.user_id);
                CoreError::ProfileNotFound
            })?;

        info!("[Auth] {} logged in", auth.user_id);
        Ok(Session {
            user_id: auth.user_id.clone(),
            auth,
            profile,
        })
    }

    /// Validate locally, create the account, then store the profile under
    /// the issued user id. Nothing is sent if validation fails.
    pub async fn register(&self, form: &SignUpForm) -> Result<Session> {
        let profile = form.validate()?;

        let auth = self.auth.sign_up(form.email.trim(), &form.password).await?;

        self.store
            .put_json(&store::user(&auth.user_id), &profile)
            .await
            .map_err(|e| CoreError::during(Action::SignUp, e))?;

        info!("[Auth] Registered {} ({})", auth.user_id, profile.email);
        Ok(Session {
            user_id: auth.user_id.clone(),
            auth,
            profile,
        })
    }
}
