use async_trait::async_trait;
use thiserror::Error;

use raidbook_core::domain::raid::{ChannelId, Raid};

pub mod memory;
pub mod raid;

pub use memory::InMemoryRaidRepository;
pub use raid::SqlRaidRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("raid in channel {channel_id} changed since version {expected}")]
    Conflict { channel_id: String, expected: u64 },
}

/// One raid document per channel.
///
/// `save` is a compare-and-swap on [`Raid::version`]: it succeeds only when the stored
/// version still equals the one the raid was loaded at, and returns the stored copy with
/// its new version. `upsert_create` replaces whatever is stored unconditionally.
#[async_trait]
pub trait RaidRepository: Send + Sync {
    async fn find_by_channel(&self, channel_id: &ChannelId) -> Result<Option<Raid>, RepositoryError>;
    async fn save(&self, raid: Raid) -> Result<Raid, RepositoryError>;
    async fn upsert_create(&self, raid: Raid) -> Result<Raid, RepositoryError>;
    async fn list_channels(&self) -> Result<Vec<ChannelId>, RepositoryError>;
}
