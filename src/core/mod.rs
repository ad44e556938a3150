//! Core data models and shared infrastructure.

pub mod http;
pub mod logging;
pub mod models;

pub use models::{
    Profile, ProfileAccount, ProfileOrganization, Summary, UsageSnapshot, UsageWindow,
};
