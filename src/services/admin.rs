//! Administrator console: member roles, space sign-off and invite codes

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invite::generate_invite_code;
use crate::models::*;
use crate::repository::{AdminGateway, InviteGateway, ProfileGateway};

/// Invite code as listed in the console
#[derive(Debug, Clone, PartialEq)]
pub struct InviteCodeView {
    pub code: InviteCode,
    /// Lowercase form shown to people
    pub display: String,
    pub used: bool,
    pub expired: bool,
}

pub struct AdminService {
    profiles: Arc<dyn ProfileGateway>,
    invites: Arc<dyn InviteGateway>,
    admin: Arc<dyn AdminGateway>,
    user_id: Uuid,
}

impl AdminService {
    pub fn new(
        profiles: Arc<dyn ProfileGateway>,
        invites: Arc<dyn InviteGateway>,
        admin: Arc<dyn AdminGateway>,
        user_id: Uuid,
    ) -> Self {
        Self {
            profiles,
            invites,
            admin,
            user_id,
        }
    }

    /// The caller's profile, if it carries the admin flag.
    ///
    /// The backend enforces the same rule; this only avoids a round trip that
    /// is bound to fail.
    pub async fn require_admin(&self) -> Result<Profile> {
        match self.profiles.get_profile(self.user_id).await? {
            Some(profile) if profile.is_admin => Ok(profile),
            _ => Err(Error::forbidden("administrator rights required")),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<Profile>> {
        self.require_admin().await?;
        let mut users = self.profiles.list_profiles().await?;
        users.sort_by(|a, b| a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()));
        Ok(users)
    }

    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> Result<()> {
        self.require_admin().await?;
        if user_id == self.user_id && !is_admin {
            return Err(Error::validation("You cannot remove your own admin rights"));
        }
        self.admin.set_user_admin(user_id, is_admin).await?;
        info!(%user_id, is_admin, "admin flag changed");
        Ok(())
    }

    /// Move a space through its lifecycle, e.g. sign it off as completed
    pub async fn update_space_status(&self, space_id: Uuid, status: SpaceStatus) -> Result<()> {
        self.require_admin().await?;
        self.admin.update_space_status(space_id, status).await?;
        info!(%space_id, %status, "space status changed");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.require_admin().await?;
        if user_id == self.user_id {
            return Err(Error::validation("You cannot delete your own account here"));
        }
        self.admin.delete_user(user_id).await?;
        info!(%user_id, "user deleted");
        Ok(())
    }

    /// All invite codes, newest first
    pub async fn list_invite_codes(&self) -> Result<Vec<InviteCodeView>> {
        self.require_admin().await?;
        let now = Utc::now();
        let mut codes = self.invites.list_invite_codes().await?;
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes
            .into_iter()
            .map(|code| InviteCodeView {
                display: code.display_code(),
                used: code.is_used(),
                expired: code.is_expired_at(now),
                code,
            })
            .collect())
    }

    pub async fn create_invite_code(&self, expires_in_days: Option<i64>) -> Result<InviteCode> {
        self.require_admin().await?;
        if let Some(days) = expires_in_days {
            if days < 1 {
                return Err(Error::validation("Expiry must be at least one day"));
            }
        }
        let invite = NewInviteCode {
            code: generate_invite_code(),
            created_by: self.user_id,
            expires_at: expires_in_days.map(|days| Utc::now() + Duration::days(days)),
        };
        self.invites.create_invite_code(&invite).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Profiles(Vec<Profile>);

    #[async_trait]
    impl ProfileGateway for Profiles {
        async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
            Ok(self.0.iter().find(|p| p.id == user_id).cloned())
        }
        async fn list_profiles(&self) -> Result<Vec<Profile>> {
            Ok(self.0.clone())
        }
        async fn upsert_profile(&self, _: &NewProfile) -> Result<Profile> {
            unreachable!()
        }
        async fn update_profile(&self, _: Uuid, _: &ProfileUpdate) -> Result<Profile> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct Invites {
        created: Mutex<Vec<NewInviteCode>>,
    }

    #[async_trait]
    impl InviteGateway for Invites {
        async fn validate_invite_code(&self, _: &str) -> Result<bool> {
            Ok(true)
        }
        async fn find_invite_code(&self, _: &str) -> Result<Option<InviteCode>> {
            Ok(None)
        }
        async fn use_invite_code(&self, _: &str, _: Uuid) -> Result<()> {
            Ok(())
        }
        async fn list_invite_codes(&self) -> Result<Vec<InviteCode>> {
            Ok(vec![serde_json::from_value(json!({
                "id": Uuid::new_v4(), "code": "AB12CD34", "used_by": Uuid::new_v4()
            }))
            .unwrap()])
        }
        async fn invite_codes_created_by(&self, _: Uuid) -> Result<Vec<InviteCode>> {
            Ok(Vec::new())
        }
        async fn create_invite_code(&self, invite: &NewInviteCode) -> Result<InviteCode> {
            self.created.lock().unwrap().push(invite.clone());
            Ok(InviteCode {
                id: Uuid::new_v4(),
                code: invite.code.clone(),
                created_by: Some(invite.created_by),
                used_by: None,
                used_at: None,
                expires_at: invite.expires_at,
                created_at: Some(Utc::now()),
            })
        }
    }

    #[derive(Default)]
    struct Admin {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AdminGateway for Admin {
        async fn set_user_admin(&self, user_id: Uuid, is_admin: bool) -> Result<()> {
            self.calls.lock().unwrap().push(format!("admin {} {}", user_id, is_admin));
            Ok(())
        }
        async fn update_space_status(&self, space_id: Uuid, status: SpaceStatus) -> Result<()> {
            self.calls.lock().unwrap().push(format!("status {} {}", space_id, status));
            Ok(())
        }
        async fn delete_user(&self, user_id: Uuid) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete {}", user_id));
            Ok(())
        }
    }

    fn profile(id: Uuid, is_admin: bool) -> Profile {
        serde_json::from_value(json!({ "id": id, "full_name": "Member", "is_admin": is_admin })).unwrap()
    }

    fn service(is_admin: bool) -> (AdminService, Arc<Admin>, Arc<Invites>, Uuid) {
        let me = Uuid::new_v4();
        let admin = Arc::new(Admin::default());
        let invites = Arc::new(Invites::default());
        let service = AdminService::new(
            Arc::new(Profiles(vec![profile(me, is_admin), profile(Uuid::new_v4(), false)])),
            invites.clone(),
            admin.clone(),
            me,
        );
        (service, admin, invites, me)
    }

    #[tokio::test]
    async fn non_admins_never_reach_the_backend() {
        let (service, admin, invites, _) = service(false);
        let other = Uuid::new_v4();

        assert!(matches!(service.set_admin(other, true).await, Err(Error::Forbidden(_))));
        assert!(matches!(
            service.update_space_status(other, SpaceStatus::Completed).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(service.delete_user(other).await, Err(Error::Forbidden(_))));
        assert!(matches!(service.create_invite_code(None).await, Err(Error::Forbidden(_))));

        assert!(admin.calls.lock().unwrap().is_empty());
        assert!(invites.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_actions() {
        let (service, admin, invites, me) = service(true);
        let space = Uuid::new_v4();

        service.update_space_status(space, SpaceStatus::Completed).await.unwrap();
        assert!(service.delete_user(me).await.is_err());
        assert!(service.set_admin(me, false).await.is_err());
        assert_eq!(
            admin.calls.lock().unwrap().as_slice(),
            [format!("status {} completed", space)]
        );

        let created = service.create_invite_code(Some(7)).await.unwrap();
        assert_eq!(created.code.len(), 8);
        assert!(created.expires_at.unwrap() > Utc::now() + Duration::days(6));
        assert_eq!(invites.created.lock().unwrap().len(), 1);
        assert!(service.create_invite_code(Some(0)).await.is_err());

        let listed = service.list_invite_codes().await.unwrap();
        assert_eq!(listed[0].display, "ab12cd34");
        assert!(listed[0].used);
        assert!(!listed[0].expired);

        assert_eq!(service.list_users().await.unwrap().len(), 2);
    }
}
