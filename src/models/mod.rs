//! Row shapes of the backend tables and the form checks run before writes

mod community;
mod event;
mod invite;
mod location;
mod notification;
mod profile;
mod space;

pub use community::*;
pub use event::*;
pub use invite::*;
pub use location::*;
pub use notification::*;
pub use profile::*;
pub use space::*;

use crate::error::{Error, Result};

pub(crate) fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::validation(message))
    }
}

pub(crate) fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}
