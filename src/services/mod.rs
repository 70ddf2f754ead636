//! Application workflows built on the repository gateways

pub mod admin;
pub mod community;
pub mod events;
pub mod filters;
pub mod notifications;
pub mod profile;
pub mod referrals;
pub mod signup;
pub mod spaces;

pub use admin::{AdminService, InviteCodeView};
pub use community::{CommunityService, SpaceRating};
pub use events::{watch_registrations, EventService, Mailer};
pub use filters::SpaceFilters;
pub use notifications::{NotificationFeed, NotificationPreferences, NotificationService};
pub use profile::ProfileService;
pub use referrals::{referral_link, ReferralService, ReferralStats};
pub use signup::{SignupOutcome, SignupRequest, SignupService};
pub use spaces::{SpaceBoard, SpaceListing};
