//! MISP REST client for the review engine.
//!
//! Implements [`misp_review_engine::RecordStore`] over the MISP API and
//! loads credential profiles. No retries, no caching.

mod client;
mod profile;

pub use client::{MispClient, MispError, Organisation};
pub use profile::{
    default_profile_path, expand_path, load_profile, Credentials, ProfileError, DEFAULT_PROFILE,
};
