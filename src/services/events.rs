//! Events, registrations and liability agreements

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::functions::EmailMessage;
use crate::models::*;
use crate::realtime::{ChangeKind, PostgresChanges, RealtimeClient, Subscription};
use crate::repository::{EventGateway, ProfileGateway};
use crate::Backend;

/// Outbound email delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sends through the email function with a token that is fresh at send time
#[async_trait]
impl Mailer for Backend {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.fresh_functions().await?.send_email(message).await
    }
}

pub struct EventService {
    events: Arc<dyn EventGateway>,
    profiles: Arc<dyn ProfileGateway>,
    mailer: Arc<dyn Mailer>,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventGateway>,
        profiles: Arc<dyn ProfileGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            events,
            profiles,
            mailer,
        }
    }

    /// Events that have not ended yet, soonest first
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        self.events.list_events_from(now).await
    }

    pub async fn create_event(&self, event: NewEvent) -> Result<Event> {
        event.validate()?;
        self.events.create_event(&event).await
    }

    async fn event(&self, event_id: Uuid) -> Result<Event> {
        self.events
            .get_event(event_id)
            .await?
            .ok_or_else(|| Error::not_found("Event not found"))
    }

    /// Sign the liability agreement of an event
    pub async fn sign_agreement(&self, agreement: NewAgreement) -> Result<Agreement> {
        agreement.validate()?;
        let event = self.event(agreement.event_id).await?;
        if !event.requires_agreement {
            return Err(Error::validation("This event does not require an agreement"));
        }
        self.events.sign_agreement(&agreement).await
    }

    /// Register for an event.
    ///
    /// The capacity check is a single backend call and is trusted as atomic.
    pub async fn register(&self, event_id: Uuid, user_id: Uuid) -> Result<Registration> {
        let event = self.event(event_id).await?;

        if event.requires_agreement {
            let signed = self
                .events
                .get_agreement(event_id, user_id)
                .await?
                .map_or(false, |a| a.accepted);
            if !signed {
                return Err(Error::validation(
                    "Please sign the agreement before registering",
                ));
            }
        }

        let existing = self.events.registrations_for_user(user_id).await?;
        let active = existing.iter().any(|r| {
            r.event_id == event_id
                && matches!(r.status, RegistrationStatus::Pending | RegistrationStatus::Approved)
        });
        if active {
            return Err(Error::validation("You are already registered for this event"));
        }

        if !self.events.check_event_capacity(event_id).await? {
            return Err(Error::validation("This event is full"));
        }

        let registration = self
            .events
            .create_registration(&NewRegistration {
                event_id,
                user_id,
                status: RegistrationStatus::Pending,
            })
            .await?;
        info!(%event_id, registration_id = %registration.id, "registration submitted");
        Ok(registration)
    }

    pub async fn cancel_registration(&self, registration_id: Uuid) -> Result<Registration> {
        self.events
            .set_registration_status(registration_id, RegistrationStatus::Cancelled)
            .await
    }

    /// Registrations still waiting for the organizer
    pub async fn pending_registrations(&self, event_id: Uuid) -> Result<Vec<Registration>> {
        Ok(self
            .events
            .list_registrations(event_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RegistrationStatus::Pending)
            .collect())
    }

    /// Approve or reject a registration as the event organizer. Approved
    /// attendees get a confirmation email; a failed email does not undo the
    /// approval.
    pub async fn review_registration(
        &self,
        organizer_id: Uuid,
        event_id: Uuid,
        registration_id: Uuid,
        approve: bool,
    ) -> Result<Registration> {
        let event = self.event(event_id).await?;
        if event.organizer_id != organizer_id {
            return Err(Error::forbidden("only the organizer can review registrations"));
        }

        let registration = self
            .events
            .list_registrations(event_id)
            .await?
            .into_iter()
            .find(|r| r.id == registration_id)
            .ok_or_else(|| Error::not_found("Registration not found"))?;
        if registration.status != RegistrationStatus::Pending {
            return Err(Error::validation("This registration was already reviewed"));
        }

        let status = if approve {
            RegistrationStatus::Approved
        } else {
            RegistrationStatus::Rejected
        };
        let updated = self
            .events
            .set_registration_status(registration_id, status)
            .await?;

        if approve {
            if let Err(e) = self.send_confirmation(&event, registration.user_id).await {
                warn!(%registration_id, "confirmation email not sent: {}", e);
            }
        }
        Ok(updated)
    }

    async fn send_confirmation(&self, event: &Event, user_id: Uuid) -> Result<()> {
        let profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .ok_or_else(|| Error::not_found("Attendee profile not found"))?;
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| Error::validation("Attendee has no email address"))?;

        let message = EmailMessage::new(
            email,
            &format!("You're in: {}", event.title),
            &confirmation_html(profile.display_name(), event),
        )?;
        self.mailer.send(&message).await
    }
}

fn confirmation_html(name: &str, event: &Event) -> String {
    format!(
        "<p>Hi {},</p><p>Your registration for <strong>{}</strong> on {} has been approved.</p>{}",
        escape_html(name),
        escape_html(&event.title),
        event.start_time.format("%A %e %B %Y, %H:%M UTC"),
        event
            .location
            .as_deref()
            .map(|l| format!("<p>Location: {}</p>", escape_html(l)))
            .unwrap_or_default()
    )
}

/// Member-supplied text placed into email HTML
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Live feed of registration changes for one event
pub async fn watch_registrations(realtime: &RealtimeClient, event_id: Uuid) -> Result<Subscription> {
    realtime
        .subscribe(
            &format!("registrations:{}", event_id),
            vec![PostgresChanges::new(ChangeKind::All, "event_registrations").eq("event_id", event_id)],
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    struct FakeEvents {
        event: Event,
        has_room: bool,
        agreement: Mutex<Option<Agreement>>,
        registrations: Mutex<Vec<Registration>>,
    }

    #[async_trait]
    impl EventGateway for FakeEvents {
        async fn list_events_from(&self, _: DateTime<Utc>) -> Result<Vec<Event>> {
            Ok(vec![self.event.clone()])
        }
        async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>> {
            Ok((event_id == self.event.id).then(|| self.event.clone()))
        }
        async fn create_event(&self, _: &NewEvent) -> Result<Event> {
            Ok(self.event.clone())
        }
        async fn check_event_capacity(&self, _: Uuid) -> Result<bool> {
            Ok(self.has_room)
        }
        async fn list_registrations(&self, event_id: Uuid) -> Result<Vec<Registration>> {
            Ok(self.registrations.lock().unwrap().iter().filter(|r| r.event_id == event_id).cloned().collect())
        }
        async fn registrations_for_user(&self, user_id: Uuid) -> Result<Vec<Registration>> {
            Ok(self.registrations.lock().unwrap().iter().filter(|r| r.user_id == user_id).cloned().collect())
        }
        async fn create_registration(&self, new: &NewRegistration) -> Result<Registration> {
            let row = Registration {
                id: Uuid::new_v4(),
                event_id: new.event_id,
                user_id: new.user_id,
                status: new.status,
                created_at: None,
            };
            self.registrations.lock().unwrap().push(row.clone());
            Ok(row)
        }
        async fn set_registration_status(&self, id: Uuid, status: RegistrationStatus) -> Result<Registration> {
            let mut rows = self.registrations.lock().unwrap();
            let row = rows.iter_mut().find(|r| r.id == id).ok_or_else(|| Error::not_found("missing"))?;
            row.status = status;
            Ok(row.clone())
        }
        async fn get_agreement(&self, _: Uuid, _: Uuid) -> Result<Option<Agreement>> {
            Ok(self.agreement.lock().unwrap().clone())
        }
        async fn sign_agreement(&self, new: &NewAgreement) -> Result<Agreement> {
            let row = Agreement {
                id: Uuid::new_v4(),
                event_id: new.event_id,
                user_id: new.user_id,
                signature: new.signature.clone(),
                accepted: new.accepted,
                signed_at: Some(Utc::now()),
            };
            *self.agreement.lock().unwrap() = Some(row.clone());
            Ok(row)
        }
    }

    struct FakeProfiles(Profile);

    #[async_trait]
    impl ProfileGateway for FakeProfiles {
        async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
            Ok((user_id == self.0.id).then(|| self.0.clone()))
        }
        async fn list_profiles(&self) -> Result<Vec<Profile>> {
            Ok(vec![self.0.clone()])
        }
        async fn upsert_profile(&self, _: &NewProfile) -> Result<Profile> {
            Ok(self.0.clone())
        }
        async fn update_profile(&self, _: Uuid, _: &ProfileUpdate) -> Result<Profile> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn setup(requires_agreement: bool, has_room: bool) -> (EventService, Arc<FakeEvents>, Arc<RecordingMailer>, Uuid) {
        let start = Utc::now() + Duration::days(3);
        let organizer = Uuid::new_v4();
        let attendee = Uuid::new_v4();
        let events = Arc::new(FakeEvents {
            event: Event {
                id: Uuid::new_v4(),
                organizer_id: organizer,
                title: "Cacao ceremony".into(),
                description: None,
                start_time: start,
                end_time: start + Duration::hours(2),
                location: Some("Garden".into()),
                capacity: 10,
                requires_agreement,
                agreement_text: requires_agreement.then(|| "At own risk".to_string()),
                created_at: None,
            },
            has_room,
            agreement: Mutex::new(None),
            registrations: Mutex::new(Vec::new()),
        });
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "id": attendee, "full_name": "Ada", "email": "ada@example.com"
        }))
        .unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let service = EventService::new(events.clone(), Arc::new(FakeProfiles(profile)), mailer.clone());
        (service, events, mailer, attendee)
    }

    #[tokio::test]
    async fn agreement_required_before_registering() {
        let (service, events, _, attendee) = setup(true, true);
        let event_id = events.event.id;

        let err = service.register(event_id, attendee).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("agreement")));

        service
            .sign_agreement(NewAgreement {
                event_id,
                user_id: attendee,
                signature: "Ada Lovelace".into(),
                accepted: true,
            })
            .await
            .unwrap();
        let registration = service.register(event_id, attendee).await.unwrap();
        assert_eq!(registration.status, RegistrationStatus::Pending);

        let again = service.register(event_id, attendee).await.unwrap_err();
        assert!(matches!(again, Error::Validation(ref m) if m.contains("already registered")));
    }

    #[tokio::test]
    async fn full_events_refuse_registration() {
        let (service, events, _, attendee) = setup(false, false);
        let err = service.register(events.event.id, attendee).await.unwrap_err();
        assert_eq!(err.to_string(), "This event is full");
        assert!(events.registrations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn organizer_approval_sends_confirmation() {
        let (service, events, mailer, attendee) = setup(false, true);
        let event_id = events.event.id;
        let organizer = events.event.organizer_id;
        let registration = service.register(event_id, attendee).await.unwrap();

        let forbidden = service
            .review_registration(attendee, event_id, registration.id, true)
            .await
            .unwrap_err();
        assert!(matches!(forbidden, Error::Forbidden(_)));

        let approved = service
            .review_registration(organizer, event_id, registration.id, true)
            .await
            .unwrap();
        assert_eq!(approved.status, RegistrationStatus::Approved);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(sent[0].subject.contains("Cacao ceremony"));
        drop(sent);

        assert!(service.pending_registrations(event_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ended_registrations_do_not_block_a_new_one() {
        let (service, events, _, attendee) = setup(false, true);
        let event_id = events.event.id;

        let first = service.register(event_id, attendee).await.unwrap();
        service.cancel_registration(first.id).await.unwrap();
        let second = service.register(event_id, attendee).await.unwrap();
        assert_ne!(second.id, first.id);

        let organizer = events.event.organizer_id;
        service.review_registration(organizer, event_id, second.id, false).await.unwrap();
        let third = service.register(event_id, attendee).await.unwrap();
        assert_eq!(third.status, RegistrationStatus::Pending);
        assert_eq!(events.registrations.lock().unwrap().len(), 3);
    }

    #[test]
    fn confirmation_escapes_member_text() {
        let (_, events, _, _) = setup(false, true);
        let mut event = events.event.clone();
        event.title = "Tea & <b>Talk</b>".into();
        event.location = Some("\"Back\" room".into());

        let html = confirmation_html("<script>x</script>", &event);
        assert!(html.contains("Hi &lt;script&gt;x&lt;/script&gt;,"));
        assert!(html.contains("<strong>Tea &amp; &lt;b&gt;Talk&lt;/b&gt;</strong>"));
        assert!(html.contains("Location: &quot;Back&quot; room"));
        assert!(!html.contains("<script>"));
    }
}
