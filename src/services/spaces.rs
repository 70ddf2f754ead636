//! The space board: the member's view of the space list with optimistic
//! join and leave

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geo::Coordinates;
use crate::models::{NewSpace, Space, SpaceStatus, SpaceUpdate};
use crate::repository::{AttendeeGateway, SpaceGateway};
use crate::services::filters::SpaceFilters;

/// A space as shown to the current member
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceListing {
    pub space: Space,
    pub attendee_count: usize,
    pub is_member: bool,
}

struct BoardState {
    spaces: Arc<dyn SpaceGateway>,
    attendees: Arc<dyn AttendeeGateway>,
    user_id: Uuid,
    viewer: Mutex<Option<Coordinates>>,
    listings: RwLock<Vec<SpaceListing>>,
    refetch_delay: Duration,
    pending_refetch: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap to clone; clones share the same listing state
#[derive(Clone)]
pub struct SpaceBoard {
    state: Arc<BoardState>,
}

impl SpaceBoard {
    pub fn new(
        spaces: Arc<dyn SpaceGateway>,
        attendees: Arc<dyn AttendeeGateway>,
        user_id: Uuid,
        refetch_delay: Duration,
    ) -> Self {
        Self {
            state: Arc::new(BoardState {
                spaces,
                attendees,
                user_id,
                viewer: Mutex::new(None),
                listings: RwLock::new(Vec::new()),
                refetch_delay,
                pending_refetch: Mutex::new(None),
            }),
        }
    }

    /// Set where the member is; radius-restricted spaces depend on it
    pub fn set_viewer_location(&self, location: Option<Coordinates>) {
        *self.state.viewer.lock().unwrap_or_else(PoisonError::into_inner) = location;
    }

    /// Fetch spaces and attendance and replace the board
    pub async fn refresh(&self) -> Result<()> {
        self.state.refresh().await
    }

    pub async fn listings(&self) -> Vec<SpaceListing> {
        self.state.listings.read().await.clone()
    }

    pub async fn listing(&self, space_id: Uuid) -> Option<SpaceListing> {
        self.state
            .listings
            .read()
            .await
            .iter()
            .find(|l| l.space.id == space_id)
            .cloned()
    }

    pub async fn filtered(&self, filters: &SpaceFilters) -> Vec<SpaceListing> {
        filters.apply(&self.state.listings.read().await)
    }

    /// Join a space. The board shows the membership right away and rolls it
    /// back if the backend refuses.
    pub async fn join(&self, space_id: Uuid) -> Result<()> {
        let previous = {
            let mut listings = self.state.listings.write().await;
            let listing = find_listing(&mut listings, space_id)?;
            if listing.is_member {
                return Err(Error::validation("You already joined this space"));
            }
            if listing.space.status != SpaceStatus::Open {
                return Err(Error::validation(format!(
                    "This space is {} and cannot be joined",
                    listing.space.status
                )));
            }
            if listing.space.is_full_with(listing.attendee_count) {
                return Err(Error::validation("This space is full"));
            }
            let previous = (listing.attendee_count, listing.is_member);
            listing.attendee_count += 1;
            listing.is_member = true;
            previous
        };

        let result = self.state.attendees.join_space(space_id, self.state.user_id).await;
        if let Err(e) = &result {
            warn!(%space_id, "join failed, reverting: {}", e);
            self.state.restore(space_id, previous).await;
        }
        self.schedule_refetch();
        result
    }

    /// Leave a space, mirroring [`SpaceBoard::join`]
    pub async fn leave(&self, space_id: Uuid) -> Result<()> {
        let previous = {
            let mut listings = self.state.listings.write().await;
            let listing = find_listing(&mut listings, space_id)?;
            if !listing.is_member {
                return Err(Error::validation("You are not attending this space"));
            }
            let previous = (listing.attendee_count, listing.is_member);
            listing.attendee_count = listing.attendee_count.saturating_sub(1);
            listing.is_member = false;
            previous
        };

        let result = self.state.attendees.leave_space(space_id, self.state.user_id).await;
        if let Err(e) = &result {
            warn!(%space_id, "leave failed, reverting: {}", e);
            self.state.restore(space_id, previous).await;
        }
        self.schedule_refetch();
        result
    }

    /// Publish a new space held by the current member
    pub async fn create_space(&self, space: NewSpace) -> Result<Space> {
        if space.holder_id != self.state.user_id {
            return Err(Error::forbidden("spaces can only be created for yourself"));
        }
        space.validate()?;
        let created = self.state.spaces.create_space(&space).await?;
        self.state.refresh().await?;
        Ok(created)
    }

    /// Edit a space the current member holds
    pub async fn update_space(&self, space_id: Uuid, update: SpaceUpdate) -> Result<Space> {
        let current = self.owned_space(space_id).await?;
        update.validate_against(&current)?;
        let updated = self.state.spaces.update_space(space_id, &update).await?;
        self.state.refresh().await?;
        Ok(updated)
    }

    /// Remove a space the current member holds
    pub async fn delete_space(&self, space_id: Uuid) -> Result<()> {
        self.owned_space(space_id).await?;
        self.state.spaces.delete_space(space_id).await?;
        self.state.refresh().await
    }

    async fn owned_space(&self, space_id: Uuid) -> Result<Space> {
        let space = self
            .state
            .spaces
            .get_space(space_id)
            .await?
            .ok_or_else(|| Error::not_found("Space not found"))?;
        if space.holder_id != self.state.user_id {
            return Err(Error::forbidden("only the holder can change this space"));
        }
        Ok(space)
    }

    fn schedule_refetch(&self) {
        let state = Arc::clone(&self.state);
        let delay = self.state.refetch_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = state.refresh().await {
                warn!("refetch after join/leave failed: {}", e);
            }
        });

        let mut pending = self
            .state
            .pending_refetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }
}

impl BoardState {
    async fn refresh(&self) -> Result<()> {
        let viewer = *self.viewer.lock().unwrap_or_else(PoisonError::into_inner);
        let spaces: Vec<Space> = self
            .spaces
            .list_spaces()
            .await?
            .into_iter()
            .filter(|space| space.is_visible_from(viewer))
            .collect();

        let ids: Vec<Uuid> = spaces.iter().map(|s| s.id).collect();
        let attendees = self.attendees.list_attendees(&ids).await?;

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        let mut joined: Vec<Uuid> = Vec::new();
        for row in &attendees {
            *counts.entry(row.space_id).or_default() += 1;
            if row.user_id == self.user_id {
                joined.push(row.space_id);
            }
        }

        let listings: Vec<SpaceListing> = spaces
            .into_iter()
            .map(|space| SpaceListing {
                attendee_count: counts.get(&space.id).copied().unwrap_or(0),
                is_member: joined.contains(&space.id),
                space,
            })
            .collect();

        debug!(count = listings.len(), "space board refreshed");
        *self.listings.write().await = listings;
        Ok(())
    }

    async fn restore(&self, space_id: Uuid, (attendee_count, is_member): (usize, bool)) {
        let mut listings = self.listings.write().await;
        if let Some(listing) = listings.iter_mut().find(|l| l.space.id == space_id) {
            listing.attendee_count = attendee_count;
            listing.is_member = is_member;
        }
    }
}

fn find_listing(listings: &mut [SpaceListing], space_id: Uuid) -> Result<&mut SpaceListing> {
    listings
        .iter_mut()
        .find(|l| l.space.id == space_id)
        .ok_or_else(|| Error::not_found("Space not found"))
}
