//! Rider directory
//!
//! The dispatch engine only reads rider identity and display fields
//! (name, phone) to snapshot them onto assignments. [`RiderDirectory`] is
//! the seam; [`RiderRegistry`] is the embedded redb implementation used
//! when no external directory is wired in.

mod registry;

pub use registry::RiderRegistry;

use async_trait::async_trait;
use shared::order::RiderProfile;
use thiserror::Error;

/// Directory lookup failure (not "rider missing", which is `Ok(None)`)
#[derive(Debug, Error)]
#[error("Rider directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// Resolves rider identities
#[async_trait]
pub trait RiderDirectory: Send + Sync {
    /// Active rider with this id, or `None`
    async fn lookup_rider(&self, rider_id: &str) -> Result<Option<RiderProfile>, DirectoryError>;
}
