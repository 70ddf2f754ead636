use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::models::not_blank;

/// Row of the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub profile_completed: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| not_blank(n))
            .or(self.email.as_deref())
            .unwrap_or("Unnamed member")
    }
}

/// Profile written during signup
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

/// Partial profile update; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_completed: Option<bool>,
}

impl ProfileUpdate {
    /// Set `profile_completed` from the profile as it will look after the update
    pub fn with_completion(mut self, current: &Profile) -> Self {
        let name = self.full_name.as_deref().or(current.full_name.as_deref());
        let bio = self.bio.as_deref().or(current.bio.as_deref());
        let address = self.address.as_deref().or(current.address.as_deref());
        self.profile_completed = Some(is_profile_complete(name, bio, address));
        self
    }
}

/// A profile is complete once name, bio and address are filled in
pub fn is_profile_complete(full_name: Option<&str>, bio: Option<&str>, address: Option<&str>) -> bool {
    [full_name, bio, address]
        .into_iter()
        .all(|field| field.map_or(false, not_blank))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> Profile {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "full_name": "Ada",
            "bio": "Yoga teacher",
            "address": null
        }))
        .unwrap()
    }

    #[test]
    fn completion_merges_current_values() {
        let update = ProfileUpdate {
            address: Some("Main St 1".into()),
            ..Default::default()
        }
        .with_completion(&profile());
        assert_eq!(update.profile_completed, Some(true));

        let blanked = ProfileUpdate {
            bio: Some("  ".into()),
            address: Some("Main St 1".into()),
            ..Default::default()
        }
        .with_completion(&profile());
        assert_eq!(blanked.profile_completed, Some(false));
    }

    #[test]
    fn update_skips_unset_fields() {
        let update = ProfileUpdate {
            bio: Some("hi".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "bio": "hi" }));
    }

    #[test]
    fn display_name_falls_back() {
        let mut p = profile();
        assert_eq!(p.display_name(), "Ada");
        p.full_name = None;
        p.email = Some("ada@example.com".into());
        assert_eq!(p.display_name(), "ada@example.com");
    }
}
