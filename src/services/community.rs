//! Ratings, time bank offerings and help requests

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::repository::CommunityGateway;

/// Aggregate rating of a space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceRating {
    pub average: Option<f64>,
    pub count: usize,
}

pub struct CommunityService {
    community: Arc<dyn CommunityGateway>,
    user_id: Uuid,
}

impl CommunityService {
    pub fn new(community: Arc<dyn CommunityGateway>, user_id: Uuid) -> Self {
        Self { community, user_id }
    }

    /// Rate a space from 1 to 5; rating again replaces the earlier score
    pub async fn rate_space(&self, space_id: Uuid, score: i16, comment: Option<String>) -> Result<Rating> {
        let rating = NewRating {
            space_id,
            user_id: self.user_id,
            score,
            comment: comment.filter(|c| !c.trim().is_empty()),
        };
        rating.validate()?;
        self.community.create_rating(&rating).await
    }

    pub async fn space_rating(&self, space_id: Uuid) -> Result<SpaceRating> {
        let ratings = self.community.ratings_for_space(space_id).await?;
        Ok(SpaceRating {
            average: average_score(&ratings),
            count: ratings.len(),
        })
    }

    pub async fn offer_time(&self, description: &str, hours: f64) -> Result<TimeOffering> {
        let offering = NewTimeOffering {
            user_id: self.user_id,
            description: description.trim().to_string(),
            hours,
            available_from: None,
        };
        offering.validate()?;
        self.community.create_time_offering(&offering).await
    }

    pub async fn time_offerings(&self) -> Result<Vec<TimeOffering>> {
        self.community.list_time_offerings().await
    }

    pub async fn request_help(&self, title: &str, description: Option<String>) -> Result<CommunityRequest> {
        let request = NewCommunityRequest {
            requester_id: self.user_id,
            title: title.trim().to_string(),
            description,
            status: RequestStatus::Open,
        };
        request.validate()?;
        self.community.create_request(&request).await
    }

    pub async fn open_requests(&self) -> Result<Vec<CommunityRequest>> {
        self.community.list_requests(Some(RequestStatus::Open)).await
    }

    /// Close or fulfil one of the caller's own requests
    pub async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<CommunityRequest> {
        let request = self
            .community
            .list_requests(None)
            .await?
            .into_iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| Error::not_found("Request not found"))?;
        if request.requester_id != self.user_id {
            return Err(Error::forbidden("only the requester can change a request"));
        }
        self.community.set_request_status(request_id, status).await
    }
}
