//! Invite-gated account creation

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{Auth, Session, SignUpMetadata};
use crate::error::{Error, Result};
use crate::invite::normalize_invite_code;
use crate::models::{NewProfile, NewReferral};
use crate::repository::{InviteGateway, ProfileGateway, ReferralGateway};

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Signup form
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub invite_code: String,
}

impl SignupRequest {
    fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(Error::validation("Please enter a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.full_name.trim().is_empty() {
            return Err(Error::validation("Full name is required"));
        }
        Ok(())
    }
}

/// What a completed signup produced
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub user_id: Uuid,
    /// `None` while the email address awaits confirmation
    pub session: Option<Session>,
    /// Member whose invite was used
    pub referred_by: Option<Uuid>,
}

pub struct SignupService {
    auth: Auth,
    invites: Arc<dyn InviteGateway>,
    profiles: Arc<dyn ProfileGateway>,
    referrals: Arc<dyn ReferralGateway>,
}

impl SignupService {
    pub fn new(
        auth: Auth,
        invites: Arc<dyn InviteGateway>,
        profiles: Arc<dyn ProfileGateway>,
        referrals: Arc<dyn ReferralGateway>,
    ) -> Self {
        Self {
            auth,
            invites,
            profiles,
            referrals,
        }
    }

    /// Create an account with an invite code.
    ///
    /// Nothing is created unless the code validates.
    pub async fn sign_up(&self, request: &SignupRequest) -> Result<SignupOutcome> {
        request.validate()?;

        let code = normalize_invite_code(&request.invite_code);
        if code.is_empty() {
            return Err(Error::validation("An invite code is required"));
        }
        if !self.invites.validate_invite_code(&code).await? {
            return Err(Error::validation("Invalid or expired invite code"));
        }
        let invite = self.invites.find_invite_code(&code).await?;

        let metadata = SignUpMetadata {
            full_name: request.full_name.trim().to_string(),
            invite_code: code.clone(),
        };
        let response = self
            .auth
            .sign_up(&request.email, &request.password, &metadata)
            .await?;
        let user_id = response.user_id()?;

        self.profiles
            .upsert_profile(&NewProfile {
                id: user_id,
                full_name: metadata.full_name.clone(),
                email: request.email.clone(),
            })
            .await?;

        self.invites.use_invite_code(&code, user_id).await?;

        let referred_by = invite.and_then(|invite| invite.created_by);
        if let Some(referrer_id) = referred_by {
            let referral = NewReferral {
                referrer_id,
                referred_id: user_id,
                invite_code: code.clone(),
            };
            if let Err(e) = self.referrals.create_referral(&referral).await {
                warn!(%referrer_id, "could not record referral: {}", e);
            }
        }

        info!(%user_id, "account created");
        Ok(SignupOutcome {
            user_id,
            session: response.session(),
            referred_by,
        })
    }
}
