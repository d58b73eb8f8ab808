//! Account flows against the auth and user services: register, login,
//! profile maintenance and presence lookups.

use chrono::Utc;
use tracing::{debug, info, warn};

use gax_net::api;
use gax_shared::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use gax_shared::protocol::ProfileUpdate;
use gax_shared::{PresenceStatus, User, UserId};

use crate::error::{ClientError, Result};
use crate::events::Notice;
use crate::session::Session;

fn validate_registration(username: &str, email: &str, password: &str) -> Result<()> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ClientError::InvalidInput("all fields are required".into()));
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ClientError::InvalidInput(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ClientError::InvalidInput("email address is not valid".into()));
    }
    Ok(())
}

/// Name used for a profile the user never filled in.
fn name_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

impl Session {
    /// Create an account, then its profile. Does not sign in.
    ///
    /// A profile failure after the account exists is only a warning: the
    /// profile is created again on the first login.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<UserId> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        validate_registration(username, &email, password)?;

        let auth = match api::register(self.gateway(), username, &email, password).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "registration failed");
                self.notify(Notice::error(format!("Registration failed: {e}")));
                return Err(e.into());
            }
        };

        match api::create_profile(self.gateway(), &auth.uuid, username, &email).await {
            Ok(_) => self.notify(Notice::success("Registration complete, you can sign in now")),
            Err(e) => {
                warn!(user_id = %auth.uuid, error = %e, "account created without profile");
                self.notify(Notice::warning(
                    "Account created, but the profile could not be saved",
                ));
            }
        }
        info!(user_id = %auth.uuid, "registered");
        Ok(auth.uuid)
    }

    /// Sign in with email and password.
    ///
    /// A missing profile is created on the spot. If even that fails the
    /// session continues with a profile built from the email address.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let auth = match api::login(self.gateway(), &email, password).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "login failed");
                self.notify(Notice::error(format!("Sign-in failed: {e}")));
                return Err(e.into());
            }
        };

        let user = match api::get_user(self.gateway(), &auth.uuid).await {
            Ok(user) => user,
            Err(e) => {
                debug!(user_id = %auth.uuid, error = %e, "no profile yet, creating one");
                let name = name_from_email(&email);
                match api::create_profile(self.gateway(), &auth.uuid, name, &email).await {
                    Ok(created) => created.user,
                    Err(e) => {
                        warn!(user_id = %auth.uuid, error = %e, "could not create profile");
                        User::new(auth.uuid.clone(), name, email.as_str(), Utc::now())
                    }
                }
            }
        };

        let token = auth.token.unwrap_or_else(|| auth.uuid.to_string());
        self.establish(&user, Some(token));
        info!(user_id = %user.id, "signed in");

        self.set_online(true).await?;
        self.notify(Notice::success(format!("Welcome back, {}!", user.username)));
        Ok(user)
    }

    /// Fetch the signed-in user's profile from the backend.
    pub async fn refresh_profile(&self) -> Result<User> {
        let user_id = self.require_user()?;
        let user = api::get_user(self.gateway(), &user_id).await?;
        self.store_user(&user);
        debug!(user_id = %user_id, "profile refreshed");
        Ok(user)
    }

    /// Change profile fields. Blank values are ignored.
    pub async fn update_profile(&self, changes: ProfileUpdate) -> Result<User> {
        let trimmed = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let changes = ProfileUpdate {
            username: trimmed(changes.username),
            email: trimmed(changes.email).map(|e| e.to_lowercase()),
            about: trimmed(changes.about),
        };
        if changes.is_empty() {
            return Err(ClientError::InvalidInput("nothing to update".into()));
        }
        let user_id = self.require_user()?;

        let user = match api::update_user(self.gateway(), &user_id, &changes).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "profile update failed");
                self.notify(Notice::error(format!("Could not update profile: {e}")));
                return Err(e.into());
            }
        };

        self.store_user(&user);
        info!(user_id = %user_id, "profile updated");
        self.notify(Notice::success("Profile updated"));
        Ok(user)
    }

    /// Delete the account on the backend, then wipe local data.
    pub async fn delete_account(&self) -> Result<()> {
        let user_id = self.require_user()?;
        if let Err(e) = api::delete_user(self.gateway(), &user_id).await {
            warn!(user_id = %user_id, error = %e, "account deletion failed");
            self.notify(Notice::error(format!("Could not delete account: {e}")));
            return Err(e.into());
        }

        info!(user_id = %user_id, "account deleted");
        self.clear_data();
        self.notify(Notice::info("Account deleted"));
        Ok(())
    }

    /// Ask the backend whether `user_id` is online and remember the answer.
    pub async fn check_online(&self, user_id: &UserId) -> Result<bool> {
        let online = api::is_online(self.gateway(), user_id).await?;
        let status = if online {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        };
        self.with_state(|s| s.presence.insert(user_id.clone(), status));
        Ok(online)
    }

    /// Fetch everyone currently online. Users known to the presence map but
    /// missing from the answer are marked offline.
    pub async fn load_online_users(&self) -> Result<Vec<UserId>> {
        self.require_user()?;
        let online = match api::online_users(self.gateway()).await {
            Ok(online) => online,
            Err(e) => {
                warn!(error = %e, "could not load online users");
                return Err(e.into());
            }
        };

        self.with_state(|s| {
            for status in s.presence.values_mut() {
                *status = PresenceStatus::Offline;
            }
            for user_id in &online {
                s.presence.insert(user_id.clone(), PresenceStatus::Online);
            }
        });
        debug!(count = online.len(), "online users loaded");
        Ok(online)
    }
}
