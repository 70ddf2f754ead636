//! Gateways to the backend tables, one trait per entity.
//!
//! Services depend on these traits so that they can be exercised without a
//! running backend; [`SupabaseStore`] implements all of them over HTTP.

mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

pub use supabase::SupabaseStore;

#[async_trait]
pub trait ProfileGateway: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;
    async fn list_profiles(&self) -> Result<Vec<Profile>>;
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<Profile>;
    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile>;
}

#[async_trait]
pub trait SpaceGateway: Send + Sync {
    async fn list_spaces(&self) -> Result<Vec<Space>>;
    async fn get_space(&self, space_id: Uuid) -> Result<Option<Space>>;
    async fn create_space(&self, space: &NewSpace) -> Result<Space>;
    async fn update_space(&self, space_id: Uuid, update: &SpaceUpdate) -> Result<Space>;
    async fn delete_space(&self, space_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait AttendeeGateway: Send + Sync {
    /// Attendance rows of the given spaces
    async fn list_attendees(&self, space_ids: &[Uuid]) -> Result<Vec<SpaceAttendee>>;
    async fn join_space(&self, space_id: Uuid, user_id: Uuid) -> Result<()>;
    async fn leave_space(&self, space_id: Uuid, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait EventGateway: Send + Sync {
    async fn list_events_from(&self, from: DateTime<Utc>) -> Result<Vec<Event>>;
    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>>;
    async fn create_event(&self, event: &NewEvent) -> Result<Event>;
    /// Whether the event still has room; evaluated atomically by the backend
    async fn check_event_capacity(&self, event_id: Uuid) -> Result<bool>;
    async fn list_registrations(&self, event_id: Uuid) -> Result<Vec<Registration>>;
    async fn registrations_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>>;
    async fn create_registration(&self, registration: &NewRegistration) -> Result<Registration>;
    async fn set_registration_status(
        &self,
        registration_id: Uuid,
        status: RegistrationStatus,
    ) -> Result<Registration>;
    async fn get_agreement(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<Agreement>>;
    async fn sign_agreement(&self, agreement: &NewAgreement) -> Result<Agreement>;
}

#[async_trait]
pub trait InviteGateway: Send + Sync {
    /// Whether a normalized code exists, is unused and has not expired
    async fn validate_invite_code(&self, code: &str) -> Result<bool>;
    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>>;
    /// Mark a code as consumed by `user_id`
    async fn use_invite_code(&self, code: &str, user_id: Uuid) -> Result<()>;
    async fn list_invite_codes(&self) -> Result<Vec<InviteCode>>;
    async fn invite_codes_created_by(&self, user_id: Uuid) -> Result<Vec<InviteCode>>;
    async fn create_invite_code(&self, invite: &NewInviteCode) -> Result<InviteCode>;
}

#[async_trait]
pub trait ReferralGateway: Send + Sync {
    async fn create_referral(&self, referral: &NewReferral) -> Result<()>;
    async fn referrals_by(&self, referrer_id: Uuid) -> Result<Vec<Referral>>;
}

/// Privileged operations; the backend re-checks the caller's role
#[async_trait]
pub trait AdminGateway: Send + Sync {
    async fn set_user_admin(&self, user_id: Uuid, is_admin: bool) -> Result<()>;
    async fn update_space_status(&self, space_id: Uuid, status: SpaceStatus) -> Result<()>;
    async fn delete_user(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CommunityGateway: Send + Sync {
    async fn ratings_for_space(&self, space_id: Uuid) -> Result<Vec<Rating>>;
    async fn create_rating(&self, rating: &NewRating) -> Result<Rating>;
    async fn list_time_offerings(&self) -> Result<Vec<TimeOffering>>;
    async fn create_time_offering(&self, offering: &NewTimeOffering) -> Result<TimeOffering>;
    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<CommunityRequest>>;
    async fn create_request(&self, request: &NewCommunityRequest) -> Result<CommunityRequest>;
    async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<CommunityRequest>;
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>>;
    async fn count_unread(&self, user_id: Uuid) -> Result<usize>;
    async fn create_notification(&self, notification: &NewNotification) -> Result<()>;
    async fn mark_read(&self, notification_id: Uuid) -> Result<()>;
    async fn mark_all_read(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait LocationGateway: Send + Sync {
    async fn list_locations(&self, user_id: Uuid) -> Result<Vec<TrackedLocation>>;
    async fn create_location(&self, location: &NewTrackedLocation) -> Result<TrackedLocation>;
    async fn record_visit(
        &self,
        location_id: Uuid,
        visit_count: i32,
        at: DateTime<Utc>,
    ) -> Result<TrackedLocation>;
}
