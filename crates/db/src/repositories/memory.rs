use std::collections::HashMap;

use tokio::sync::RwLock;

use raidbook_core::domain::raid::{ChannelId, Raid};

use super::{RaidRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryRaidRepository {
    raids: RwLock<HashMap<String, Raid>>,
}

#[async_trait::async_trait]
impl RaidRepository for InMemoryRaidRepository {
    async fn find_by_channel(&self, channel_id: &ChannelId) -> Result<Option<Raid>, RepositoryError> {
        let raids = self.raids.read().await;
        Ok(raids.get(channel_id.as_str()).cloned())
    }

    async fn save(&self, mut raid: Raid) -> Result<Raid, RepositoryError> {
        let mut raids = self.raids.write().await;
        let stored_version = raids.get(raid.channel_id.as_str()).map_or(0, |stored| stored.version);
        if stored_version != raid.version {
            return Err(RepositoryError::Conflict {
                channel_id: raid.channel_id.0.clone(),
                expected: raid.version,
            });
        }

        raid.version = stored_version + 1;
        raids.insert(raid.channel_id.0.clone(), raid.clone());
        Ok(raid)
    }

    async fn upsert_create(&self, mut raid: Raid) -> Result<Raid, RepositoryError> {
        let mut raids = self.raids.write().await;
        raid.version = raids.get(raid.channel_id.as_str()).map_or(0, |stored| stored.version) + 1;
        raids.insert(raid.channel_id.0.clone(), raid.clone());
        Ok(raid)
    }

    async fn list_channels(&self) -> Result<Vec<ChannelId>, RepositoryError> {
        let raids = self.raids.read().await;
        let mut channels: Vec<ChannelId> = raids.values().map(|raid| raid.channel_id.clone()).collect();
        channels.sort();
        Ok(channels)
    }
}
