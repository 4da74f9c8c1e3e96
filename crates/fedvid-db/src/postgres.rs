//! Postgres store implementation
//!
//! Every mutation transaction runs under SERIALIZABLE isolation; Postgres
//! aborts the losing side of a conflict with SQLSTATE 40001, which the
//! error classifier in fedvid-core turns into
//! `StoreError::SerializationConflict` for the retry executor.
//!
//! Find-or-create is a plain SELECT-then-INSERT inside the transaction.
//! A concurrent duplicate insert surfaces as a serialization conflict or a
//! unique-constraint violation, and the retry loop resolves it.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::BTreeSet;

use fedvid_core::models::{Author, Tag, Video, VideoDraft, VideoUpdate};
use fedvid_core::StoreError;

use crate::store::{Store, StoreTransaction};

const MAX_CONNECTIONS: u32 = 20;

const VIDEO_COLUMNS: &str = "id, name, extname, category, licence, language, nsfw, description, \
                             duration, views, author_id, origin_pod_id, remote_id, created_at";

fn row_to_video(row: &PgRow) -> Result<Video, StoreError> {
    Ok(Video {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        extname: row.try_get("extname")?,
        category: row.try_get("category")?,
        licence: row.try_get("licence")?,
        language: row.try_get("language")?,
        nsfw: row.try_get("nsfw")?,
        description: row.try_get("description")?,
        duration: row.try_get("duration")?,
        views: row.try_get("views")?,
        author_id: row.try_get("author_id")?,
        origin_pod_id: row.try_get("origin_pod_id")?,
        remote_id: row.try_get("remote_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Run pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgStoreTransaction;

    async fn begin_serializable(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(PgStoreTransaction { tx })
    }

    async fn get_video(&self, id: i64) -> Result<Option<Video>, StoreError> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_video).transpose()
    }

    async fn increment_views(&self, video_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
            .bind(video_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("video {video_id} not found")));
        }

        Ok(())
    }

    async fn delete_video(&self, video_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(video_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// One open SERIALIZABLE Postgres transaction.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find_or_create_author(
        &mut self,
        name: &str,
        pod_id: Option<i64>,
    ) -> Result<Author, StoreError> {
        let existing = sqlx::query(
            "SELECT id, name, pod_id FROM authors \
             WHERE name = $1 AND pod_id IS NOT DISTINCT FROM $2",
        )
        .bind(name)
        .bind(pod_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = existing {
            return Ok(Author {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                pod_id: row.try_get("pod_id")?,
            });
        }

        let row = sqlx::query("INSERT INTO authors (name, pod_id) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(pod_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(Author {
            id: row.try_get("id")?,
            name: name.to_string(),
            pod_id,
        })
    }

    async fn find_or_create_tags(&mut self, names: &[String]) -> Result<Vec<Tag>, StoreError> {
        // Dedup through a BTreeSet so resolution is order-independent.
        let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let mut tags = Vec::with_capacity(unique.len());

        for name in unique {
            let existing = sqlx::query("SELECT id FROM tags WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await?;

            let id = match existing {
                Some(row) => row.try_get("id")?,
                None => {
                    let row = sqlx::query("INSERT INTO tags (name) VALUES ($1) RETURNING id")
                        .bind(name)
                        .fetch_one(&mut *self.tx)
                        .await?;
                    row.try_get("id")?
                }
            };

            tags.push(Tag {
                id,
                name: name.to_string(),
            });
        }

        Ok(tags)
    }

    async fn get_author(&mut self, id: i64) -> Result<Option<Author>, StoreError> {
        let row = sqlx::query("SELECT id, name, pod_id FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| {
            Ok(Author {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                pod_id: row.try_get("pod_id")?,
            })
        })
        .transpose()
    }

    async fn get_video(&mut self, id: i64) -> Result<Option<Video>, StoreError> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_video).transpose()
    }

    async fn insert_video(&mut self, draft: &VideoDraft) -> Result<Video, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO videos \
             (name, extname, category, licence, language, nsfw, description, duration, \
              author_id, origin_pod_id, remote_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(&draft.extname)
        .bind(draft.category)
        .bind(draft.licence)
        .bind(draft.language)
        .bind(draft.nsfw)
        .bind(&draft.description)
        .bind(draft.duration)
        .bind(draft.author_id)
        .bind(draft.origin_pod_id)
        .bind(draft.remote_id)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_video(&row)
    }

    async fn update_video(&mut self, id: i64, fields: &VideoUpdate) -> Result<Video, StoreError> {
        if fields.is_field_noop() {
            return self
                .get_video(id)
                .await?
                .ok_or_else(|| StoreError::Backend(format!("video {id} not found")));
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE videos SET ");
        {
            let mut sep = qb.separated(", ");
            if let Some(name) = &fields.name {
                sep.push("name = ");
                sep.push_bind_unseparated(name.clone());
            }
            if let Some(category) = fields.category {
                sep.push("category = ");
                sep.push_bind_unseparated(category);
            }
            if let Some(licence) = fields.licence {
                sep.push("licence = ");
                sep.push_bind_unseparated(licence);
            }
            if let Some(language) = fields.language {
                sep.push("language = ");
                sep.push_bind_unseparated(language);
            }
            if let Some(nsfw) = fields.nsfw {
                sep.push("nsfw = ");
                sep.push_bind_unseparated(nsfw);
            }
            if let Some(description) = &fields.description {
                sep.push("description = ");
                sep.push_bind_unseparated(description.clone());
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {VIDEO_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("video {id} not found")))?;

        row_to_video(&row)
    }

    async fn set_video_tags(&mut self, video_id: i64, tag_ids: &[i64]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM video_tags WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *self.tx)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT INTO video_tags (video_id, tag_id) VALUES ($1, $2)")
                .bind(video_id)
                .bind(tag_id)
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(())
    }

    async fn get_video_tags(&mut self, video_id: i64) -> Result<Vec<Tag>, StoreError> {
        let rows = sqlx::query(
            "SELECT t.id, t.name FROM tags t \
             JOIN video_tags vt ON vt.tag_id = t.id \
             WHERE vt.video_id = $1 ORDER BY t.name",
        )
        .bind(video_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Tag {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::from)
    }

    async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "transaction rollback failed");
        }
    }
}
