//! Gateway implementations over the REST and RPC endpoints

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::postgrest::{Postgrest, SortOrder};
use crate::repository::*;
use crate::Backend;

const PROFILES: &str = "profiles";
const SPACES: &str = "spaces";
const SPACE_ATTENDEES: &str = "space_attendees";
const EVENTS: &str = "events";
const EVENT_REGISTRATIONS: &str = "event_registrations";
const AGREEMENTS: &str = "agreements";
const INVITE_CODES: &str = "invite_codes";
const REFERRALS: &str = "referrals";
const RATINGS: &str = "ratings";
const TIME_OFFERINGS: &str = "time_offerings";
const COMMUNITY_REQUESTS: &str = "community_requests";
const NOTIFICATIONS: &str = "notifications";
const LOCATIONS: &str = "locations";

/// All gateways backed by the hosted database
#[derive(Clone)]
pub struct SupabaseStore {
    backend: Backend,
}

impl SupabaseStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    async fn db(&self) -> Result<Postgrest> {
        self.backend.fresh_database().await
    }
}

fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("{} not found", what)))
}

#[async_trait]
impl ProfileGateway for SupabaseStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.db().await?.from(PROFILES).select("*").eq("id", user_id).single().await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.db()
            .await?
            .from(PROFILES)
            .select("*")
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let rows = self.db().await?.from(PROFILES).upsert(profile, "id").await?;
        first_row(rows, "Profile")
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        let rows = self.db().await?.from(PROFILES).eq("id", user_id).update(update).await?;
        first_row(rows, "Profile")
    }
}

#[async_trait]
impl SpaceGateway for SupabaseStore {
    async fn list_spaces(&self) -> Result<Vec<Space>> {
        self.db()
            .await?
            .from(SPACES)
            .select("*")
            .order("start_time", SortOrder::Ascending)
            .execute()
            .await
    }

    async fn get_space(&self, space_id: Uuid) -> Result<Option<Space>> {
        self.db().await?.from(SPACES).select("*").eq("id", space_id).single().await
    }

    async fn create_space(&self, space: &NewSpace) -> Result<Space> {
        let rows = self.db().await?.from(SPACES).insert(space).await?;
        let created: Space = first_row(rows, "Space")?;
        info!(space_id = %created.id, "space created");
        Ok(created)
    }

    async fn update_space(&self, space_id: Uuid, update: &SpaceUpdate) -> Result<Space> {
        let rows = self.db().await?.from(SPACES).eq("id", space_id).update(update).await?;
        first_row(rows, "Space")
    }

    async fn delete_space(&self, space_id: Uuid) -> Result<()> {
        self.db().await?.from(SPACES).eq("id", space_id).delete().await
    }
}

#[async_trait]
impl AttendeeGateway for SupabaseStore {
    async fn list_attendees(&self, space_ids: &[Uuid]) -> Result<Vec<SpaceAttendee>> {
        if space_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.db()
            .await?
            .from(SPACE_ATTENDEES)
            .select("space_id,user_id,joined_at")
            .in_list("space_id", space_ids)
            .execute()
            .await
    }

    async fn join_space(&self, space_id: Uuid, user_id: Uuid) -> Result<()> {
        debug!(%space_id, "joining space");
        self.db()
            .await?
            .from(SPACE_ATTENDEES)
            .insert_no_return(&json!({ "space_id": space_id, "user_id": user_id }))
            .await
    }

    async fn leave_space(&self, space_id: Uuid, user_id: Uuid) -> Result<()> {
        debug!(%space_id, "leaving space");
        self.db()
            .await?
            .from(SPACE_ATTENDEES)
            .eq("space_id", space_id)
            .eq("user_id", user_id)
            .delete()
            .await
    }
}

#[async_trait]
impl EventGateway for SupabaseStore {
    async fn list_events_from(&self, from: DateTime<Utc>) -> Result<Vec<Event>> {
        self.db()
            .await?
            .from(EVENTS)
            .select("*")
            .gte("end_time", from.to_rfc3339())
            .order("start_time", SortOrder::Ascending)
            .execute()
            .await
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        self.db().await?.from(EVENTS).select("*").eq("id", event_id).single().await
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event> {
        let rows = self.db().await?.from(EVENTS).insert(event).await?;
        first_row(rows, "Event")
    }

    async fn check_event_capacity(&self, event_id: Uuid) -> Result<bool> {
        self.db()
            .await?
            .rpc("check_event_capacity", &json!({ "p_event_id": event_id }))?
            .execute::<bool>()
            .await
    }

    async fn list_registrations(&self, event_id: Uuid) -> Result<Vec<Registration>> {
        self.db()
            .await?
            .from(EVENT_REGISTRATIONS)
            .select("*")
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Ascending)
            .execute()
            .await
    }

    async fn registrations_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>> {
        self.db()
            .await?
            .from(EVENT_REGISTRATIONS)
            .select("*")
            .eq("user_id", user_id)
            .execute()
            .await
    }

    async fn create_registration(&self, registration: &NewRegistration) -> Result<Registration> {
        let rows = self.db().await?.from(EVENT_REGISTRATIONS).insert(registration).await?;
        first_row(rows, "Registration")
    }

    async fn set_registration_status(
        &self,
        registration_id: Uuid,
        status: RegistrationStatus,
    ) -> Result<Registration> {
        let rows = self
            .db()
            .await?
            .from(EVENT_REGISTRATIONS)
            .eq("id", registration_id)
            .update(&json!({ "status": status }))
            .await?;
        first_row(rows, "Registration")
    }

    async fn get_agreement(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<Agreement>> {
        self.db()
            .await?
            .from(AGREEMENTS)
            .select("*")
            .eq("event_id", event_id)
            .eq("user_id", user_id)
            .single()
            .await
    }

    async fn sign_agreement(&self, agreement: &NewAgreement) -> Result<Agreement> {
        let rows = self
            .db()
            .await?
            .from(AGREEMENTS)
            .upsert(agreement, "event_id,user_id")
            .await?;
        first_row(rows, "Agreement")
    }
}

#[async_trait]
impl InviteGateway for SupabaseStore {
    async fn validate_invite_code(&self, code: &str) -> Result<bool> {
        self.db()
            .await?
            .rpc("validate_invite_code", &json!({ "p_code": code }))?
            .execute::<bool>()
            .await
    }

    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>> {
        self.db().await?.from(INVITE_CODES).select("*").eq("code", code).single().await
    }

    async fn use_invite_code(&self, code: &str, user_id: Uuid) -> Result<()> {
        self.db()
            .await?
            .rpc("use_invite_code", &json!({ "p_code": code, "p_user_id": user_id }))?
            .execute_void()
            .await
    }

    async fn list_invite_codes(&self) -> Result<Vec<InviteCode>> {
        self.db()
            .await?
            .from(INVITE_CODES)
            .select("*")
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }

    async fn invite_codes_created_by(&self, user_id: Uuid) -> Result<Vec<InviteCode>> {
        self.db()
            .await?
            .from(INVITE_CODES)
            .select("*")
            .eq("created_by", user_id)
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }

    async fn create_invite_code(&self, invite: &NewInviteCode) -> Result<InviteCode> {
        let rows = self.db().await?.from(INVITE_CODES).insert(invite).await?;
        first_row(rows, "Invite code")
    }
}

#[async_trait]
impl ReferralGateway for SupabaseStore {
    async fn create_referral(&self, referral: &NewReferral) -> Result<()> {
        self.db().await?.from(REFERRALS).insert_no_return(referral).await
    }

    async fn referrals_by(&self, referrer_id: Uuid) -> Result<Vec<Referral>> {
        self.db()
            .await?
            .from(REFERRALS)
            .select("*")
            .eq("referrer_id", referrer_id)
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }
}

#[async_trait]
impl AdminGateway for SupabaseStore {
    async fn set_user_admin(&self, user_id: Uuid, is_admin: bool) -> Result<()> {
        self.db()
            .await?
            .rpc("set_user_admin", &json!({ "p_user_id": user_id, "p_is_admin": is_admin }))?
            .execute_void()
            .await
    }

    async fn update_space_status(&self, space_id: Uuid, status: SpaceStatus) -> Result<()> {
        self.db()
            .await?
            .rpc(
                "admin_update_space_status",
                &json!({ "p_space_id": space_id, "p_status": status }),
            )?
            .execute_void()
            .await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.db()
            .await?
            .rpc("admin_delete_user", &json!({ "p_user_id": user_id }))?
            .execute_void()
            .await
    }
}

#[async_trait]
impl CommunityGateway for SupabaseStore {
    async fn ratings_for_space(&self, space_id: Uuid) -> Result<Vec<Rating>> {
        self.db()
            .await?
            .from(RATINGS)
            .select("*")
            .eq("space_id", space_id)
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }

    async fn create_rating(&self, rating: &NewRating) -> Result<Rating> {
        let rows = self.db().await?.from(RATINGS).upsert(rating, "space_id,user_id").await?;
        first_row(rows, "Rating")
    }

    async fn list_time_offerings(&self) -> Result<Vec<TimeOffering>> {
        self.db()
            .await?
            .from(TIME_OFFERINGS)
            .select("*")
            .order("created_at", SortOrder::Descending)
            .execute()
            .await
    }

    async fn create_time_offering(&self, offering: &NewTimeOffering) -> Result<TimeOffering> {
        let rows = self.db().await?.from(TIME_OFFERINGS).insert(offering).await?;
        first_row(rows, "Time offering")
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<CommunityRequest>> {
        let mut query = self
            .db()
            .await?
            .from(COMMUNITY_REQUESTS)
            .select("*")
            .order("created_at", SortOrder::Descending);
        if let Some(status) = status {
            let value = serde_json::to_value(status)?;
            query = query.eq("status", value.as_str().unwrap_or_default());
        }
        query.execute().await
    }

    async fn create_request(&self, request: &NewCommunityRequest) -> Result<CommunityRequest> {
        let rows = self.db().await?.from(COMMUNITY_REQUESTS).insert(request).await?;
        first_row(rows, "Community request")
    }

    async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<CommunityRequest> {
        let rows = self
            .db()
            .await?
            .from(COMMUNITY_REQUESTS)
            .eq("id", request_id)
            .update(&json!({ "status": status }))
            .await?;
        first_row(rows, "Community request")
    }
}

#[async_trait]
impl NotificationGateway for SupabaseStore {
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.db()
            .await?
            .from(NOTIFICATIONS)
            .select("*")
            .eq("user_id", user_id)
            .order("created_at", SortOrder::Descending)
            .limit(50)
            .execute()
            .await
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<usize> {
        self.db()
            .await?
            .from(NOTIFICATIONS)
            .select("id")
            .eq("user_id", user_id)
            .eq("read", false)
            .count()
            .await
    }

    async fn create_notification(&self, notification: &NewNotification) -> Result<()> {
        self.db().await?.from(NOTIFICATIONS).insert_no_return(notification).await
    }

    async fn mark_read(&self, notification_id: Uuid) -> Result<()> {
        let _: Vec<Notification> = self
            .db()
            .await?
            .from(NOTIFICATIONS)
            .eq("id", notification_id)
            .update(&json!({ "read": true }))
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<()> {
        let _: Vec<Notification> = self
            .db()
            .await?
            .from(NOTIFICATIONS)
            .eq("user_id", user_id)
            .eq("read", false)
            .update(&json!({ "read": true }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LocationGateway for SupabaseStore {
    async fn list_locations(&self, user_id: Uuid) -> Result<Vec<TrackedLocation>> {
        self.db()
            .await?
            .from(LOCATIONS)
            .select("*")
            .eq("user_id", user_id)
            .execute()
            .await
    }

    async fn create_location(&self, location: &NewTrackedLocation) -> Result<TrackedLocation> {
        let rows = self.db().await?.from(LOCATIONS).insert(location).await?;
        first_row(rows, "Location")
    }

    async fn record_visit(
        &self,
        location_id: Uuid,
        visit_count: i32,
        at: DateTime<Utc>,
    ) -> Result<TrackedLocation> {
        let rows = self
            .db()
            .await?
            .from(LOCATIONS)
            .eq("id", location_id)
            .update(&json!({ "visit_count": visit_count, "last_visited_at": at }))
            .await?;
        first_row(rows, "Location")
    }
}
