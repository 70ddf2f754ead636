//! Referral program: a member's invite link and the people it brought in

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::invite::{display_invite_code, generate_invite_code};
use crate::models::*;
use crate::repository::{InviteGateway, ProfileGateway, ReferralGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralStats {
    pub count: usize,
    /// Profiles of referred members that could still be found
    pub referred: Vec<Profile>,
}

impl ReferralStats {
    pub fn names(&self) -> Vec<&str> {
        self.referred.iter().map(|p| p.display_name()).collect()
    }
}

/// Signup link carrying an invite code
pub fn referral_link(site_url: &str, code: &str) -> String {
    format!(
        "{}/signup?invite={}",
        site_url.trim_end_matches('/'),
        display_invite_code(code)
    )
}

pub struct ReferralService {
    referrals: Arc<dyn ReferralGateway>,
    invites: Arc<dyn InviteGateway>,
    profiles: Arc<dyn ProfileGateway>,
    user_id: Uuid,
}

impl ReferralService {
    pub fn new(
        referrals: Arc<dyn ReferralGateway>,
        invites: Arc<dyn InviteGateway>,
        profiles: Arc<dyn ProfileGateway>,
        user_id: Uuid,
    ) -> Self {
        Self {
            referrals,
            invites,
            profiles,
            user_id,
        }
    }

    pub async fn stats(&self) -> Result<ReferralStats> {
        let referrals = self.referrals.referrals_by(self.user_id).await?;
        let mut referred = Vec::with_capacity(referrals.len());
        for referral in &referrals {
            match self.profiles.get_profile(referral.referred_id).await? {
                Some(profile) => referred.push(profile),
                None => debug!(user_id = %referral.referred_id, "referred profile missing"),
            }
        }
        Ok(ReferralStats {
            count: referrals.len(),
            referred,
        })
    }

    /// An unused, unexpired code of the caller, minted on first use
    pub async fn my_invite_code(&self) -> Result<InviteCode> {
        let now = Utc::now();
        let existing = self
            .invites
            .invite_codes_created_by(self.user_id)
            .await?
            .into_iter()
            .find(|c| !c.is_used() && !c.is_expired_at(now));
        if let Some(code) = existing {
            return Ok(code);
        }

        self.invites
            .create_invite_code(&NewInviteCode {
                code: generate_invite_code(),
                created_by: self.user_id,
                expires_at: None,
            })
            .await
    }
}
