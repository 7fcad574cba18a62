use sqlx::Row;

use raidbook_core::domain::raid::{ChannelId, Raid};

use super::{RaidRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRaidRepository {
    pool: DbPool,
}

impl SqlRaidRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_raid(row: &sqlx::sqlite::SqliteRow) -> Result<Raid, RepositoryError> {
    let document: String =
        row.try_get("document").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i64 = row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let mut raid: Raid =
        serde_json::from_str(&document).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    raid.version = u64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("negative raid version {version}")))?;
    Ok(raid)
}

fn encode(raid: &Raid) -> Result<String, RepositoryError> {
    serde_json::to_string(raid).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn version_param(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version).map_err(|_| RepositoryError::Decode(format!("raid version {version} out of range")))
}

#[async_trait::async_trait]
impl RaidRepository for SqlRaidRepository {
    async fn find_by_channel(&self, channel_id: &ChannelId) -> Result<Option<Raid>, RepositoryError> {
        let row = sqlx::query("SELECT document, version FROM raid WHERE channel_id = ?")
            .bind(channel_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_raid(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, mut raid: Raid) -> Result<Raid, RepositoryError> {
        let expected = raid.version;
        raid.version = expected + 1;
        let document = encode(&raid)?;

        let result = if expected == 0 {
            sqlx::query(
                "INSERT INTO raid (channel_id, raid_id, name, locked, document, version, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, 1, ?, ?)
                 ON CONFLICT(channel_id) DO NOTHING",
            )
            .bind(raid.channel_id.as_str())
            .bind(&raid.id.0)
            .bind(&raid.name)
            .bind(raid.locked)
            .bind(&document)
            .bind(raid.created_at.to_rfc3339())
            .bind(raid.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE raid
                 SET raid_id = ?, name = ?, locked = ?, document = ?, version = version + 1, updated_at = ?
                 WHERE channel_id = ? AND version = ?",
            )
            .bind(&raid.id.0)
            .bind(&raid.name)
            .bind(raid.locked)
            .bind(&document)
            .bind(raid.updated_at.to_rfc3339())
            .bind(raid.channel_id.as_str())
            .bind(version_param(expected)?)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict { channel_id: raid.channel_id.0.clone(), expected });
        }
        Ok(raid)
    }

    async fn upsert_create(&self, mut raid: Raid) -> Result<Raid, RepositoryError> {
        let document = encode(&raid)?;

        let row = sqlx::query(
            "INSERT INTO raid (channel_id, raid_id, name, locked, document, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(channel_id) DO UPDATE SET
                 raid_id = excluded.raid_id,
                 name = excluded.name,
                 locked = excluded.locked,
                 document = excluded.document,
                 version = raid.version + 1,
                 created_at = excluded.created_at,
                 updated_at = excluded.updated_at
             RETURNING version",
        )
        .bind(raid.channel_id.as_str())
        .bind(&raid.id.0)
        .bind(&raid.name)
        .bind(raid.locked)
        .bind(&document)
        .bind(raid.created_at.to_rfc3339())
        .bind(raid.updated_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let version: i64 = row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        raid.version = u64::try_from(version)
            .map_err(|_| RepositoryError::Decode(format!("negative raid version {version}")))?;
        Ok(raid)
    }

    async fn list_channels(&self) -> Result<Vec<ChannelId>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT channel_id FROM raid ORDER BY channel_id ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("channel_id")
                    .map(ChannelId)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use raidbook_core::domain::raid::{ChannelId, Raid, Role, RoleCounts};
    use raidbook_core::domain::signup::ParticipantId;

    use super::SqlRaidRepository;
    use crate::repositories::{RaidRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn raid(channel: &str) -> Raid {
        Raid::create(ChannelId::new(channel), "Molten Core", RoleCounts::new(2, 4, 14))
    }

    #[tokio::test]
    async fn sql_raid_repo_round_trip() {
        let repo = SqlRaidRepository::new(setup().await);
        let mut raid = raid("C1");
        raid.submit_signup(&ParticipantId::new("U1"), "Thrall").expect("signup");

        let saved = repo.save(raid).await.expect("save");
        assert_eq!(saved.version, 1);

        let found = repo.find_by_channel(&ChannelId::new("C1")).await.expect("find").expect("raid");
        assert_eq!(found, saved);
        assert!(found.signup(&ParticipantId::new("U1")).is_some());
    }

    #[tokio::test]
    async fn sql_save_rejects_stale_versions() {
        let repo = SqlRaidRepository::new(setup().await);
        let loaded = repo.save(raid("C1")).await.expect("seed");

        let mut admin = loaded.clone();
        admin.close().expect("close");
        let locked = repo.save(admin).await.expect("close saved");
        assert_eq!(locked.version, 2);

        let mut player = loaded;
        player.submit_signup(&ParticipantId::new("U2"), "Jaina").expect("signup");
        let error = repo.save(player).await.expect_err("stale");
        assert!(matches!(error, RepositoryError::Conflict { expected: 1, .. }));

        let stored = repo.find_by_channel(&ChannelId::new("C1")).await.expect("find").expect("raid");
        assert!(stored.locked);
        assert!(stored.signups.is_empty());
    }

    #[tokio::test]
    async fn sql_first_save_conflicts_with_existing_row() {
        let repo = SqlRaidRepository::new(setup().await);
        repo.save(raid("C1")).await.expect("first");

        let error = repo.save(raid("C1")).await.expect_err("second fresh raid");
        assert!(matches!(error, RepositoryError::Conflict { expected: 0, .. }));
    }

    #[tokio::test]
    async fn sql_upsert_create_replaces_the_channel_raid() {
        let repo = SqlRaidRepository::new(setup().await);
        let mut first = raid("C1");
        first.final_selection.get_mut(Role::Tanks).push(ParticipantId::new("U1"));
        let first = repo.save(first).await.expect("seed");

        let replacement = repo.upsert_create(raid("C1")).await.expect("recreate");
        assert_eq!(replacement.version, 2);
        assert_ne!(replacement.id, first.id);

        let stored = repo.find_by_channel(&ChannelId::new("C1")).await.expect("find").expect("raid");
        assert!(stored.final_selection.is_empty());
        assert_eq!(stored.version, 2);

        repo.upsert_create(raid("C0")).await.expect("other channel");
        assert_eq!(
            repo.list_channels().await.expect("list"),
            vec![ChannelId::new("C0"), ChannelId::new("C1")]
        );
    }
}
