//! Local CLI state under the storage root

pub mod layout;
pub mod settings;
