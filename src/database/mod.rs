pub mod models;


use anyhow::{bail, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::matching::normalize::strip_accents_lower;
use crate::search::dates::date_renderings;
use crate::search::predicate::{build_predicate, Field, Predicate};

pub use models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
        ",
        )?;

        register_functions(&conn)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS speakers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                bio TEXT,
                photo_url TEXT,
                background_images TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT,
                color TEXT NOT NULL DEFAULT '#6366f1',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                youtube_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                thumbnail_url TEXT,
                speaker_id INTEGER REFERENCES speakers(id) ON DELETE SET NULL,
                topic_id INTEGER REFERENCES topics(id) ON DELETE SET NULL,
                published_at TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                duration INTEGER NOT NULL DEFAULT 0,
                view_count INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_videos_speaker ON videos(speaker_id);
            CREATE INDEX IF NOT EXISTS idx_videos_topic ON videos(topic_id);
            CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published_at DESC);
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Videos
    // ========================================================================

    /// List videos with filters, free-text search and pagination.
    ///
    /// The free-text query goes through the search planner; the resulting
    /// predicate tree is translated into parameterized SQL here. Results
    /// order by publish date then id - catalog browse order, never text
    /// relevance.
    pub fn get_videos(&self, filter: &VideoFilter) -> Result<(Vec<Video>, i64)> {
        let conn = self.conn.lock().unwrap();

        let mut predicate = filter.query.as_deref().and_then(build_predicate);
        if let Some(speaker_id) = filter.speaker_id {
            predicate = Some(match predicate {
                Some(p) => p.and(Predicate::SpeakerIs(speaker_id)),
                None => Predicate::SpeakerIs(speaker_id),
            });
        }
        if let Some(topic_id) = filter.topic_id {
            predicate = Some(match predicate {
                Some(p) => p.and(Predicate::TopicIs(topic_id)),
                None => Predicate::TopicIs(topic_id),
            });
        }

        let mut where_params: Vec<Value> = Vec::new();
        let where_clause = match &predicate {
            Some(p) => format!("WHERE {}", predicate_to_sql(p, &mut where_params)),
            None => String::new(),
        };

        let count_sql = format!(
            "SELECT COUNT(*)
             FROM videos v
             LEFT JOIN speakers s ON v.speaker_id = s.id
             LEFT JOIN topics t ON v.topic_id = t.id
             {where_clause}"
        );
        let total: i64 =
            conn.query_row(&count_sql, params_from_iter(where_params.iter()), |row| row.get(0))?;

        let direction = if filter.sort_desc { "DESC" } else { "ASC" };
        let sql = format!(
            "{VIDEO_SELECT}
             {where_clause}
             ORDER BY v.published_at {direction}, v.id {direction}
             LIMIT ? OFFSET ?"
        );

        let mut all_params = where_params;
        all_params.push(Value::Integer(filter.limit));
        all_params.push(Value::Integer(filter.offset));

        let mut stmt = conn.prepare(&sql)?;
        let videos = stmt
            .query_map(params_from_iter(all_params.iter()), map_video_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((videos, total))
    }

    pub fn get_video_by_id(&self, id: i64) -> Result<Option<Video>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{VIDEO_SELECT} WHERE v.id = ?");
        let video = conn
            .query_row(&sql, params![id], map_video_row)
            .optional()?;
        Ok(video)
    }

    pub fn get_video_by_youtube_id(&self, youtube_id: &str) -> Result<Option<Video>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{VIDEO_SELECT} WHERE v.youtube_id = ?");
        let video = conn
            .query_row(&sql, params![youtube_id], map_video_row)
            .optional()?;
        Ok(video)
    }

    /// Insert a new video or refresh an existing one (by `youtube_id`).
    ///
    /// Only provider-owned columns are refreshed on update - speaker and
    /// topic assignments survive re-syncs. A concurrent insert of the same
    /// `youtube_id` loses the race on the UNIQUE constraint and is retried
    /// as an update.
    pub fn upsert_video(&self, video: &NewVideo) -> Result<(i64, bool)> {
        let conn = self.conn.lock().unwrap();

        if let Some(id) = Self::video_id_for(&conn, &video.youtube_id)? {
            Self::refresh_video(&conn, id, video)?;
            return Ok((id, false));
        }

        let tags_json = serde_json::to_string(&video.tags)?;
        let inserted = conn.execute(
            "INSERT INTO videos (youtube_id, title, description, thumbnail_url, published_at, tags, duration, view_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                video.youtube_id,
                video.title,
                video.description,
                video.thumbnail_url,
                video.published_at,
                tags_json,
                video.duration_seconds,
                video.view_count
            ],
        );

        match inserted {
            Ok(_) => Ok((conn.last_insert_rowid(), true)),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race against a concurrent ingestion of the same
                // video: fall back to the update path.
                let id = Self::video_id_for(&conn, &video.youtube_id)?
                    .ok_or_else(|| anyhow::anyhow!("video vanished during upsert conflict"))?;
                Self::refresh_video(&conn, id, video)?;
                Ok((id, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn video_id_for(conn: &Connection, youtube_id: &str) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM videos WHERE youtube_id = ?",
                params![youtube_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn refresh_video(conn: &Connection, id: i64, video: &NewVideo) -> Result<()> {
        let tags_json = serde_json::to_string(&video.tags)?;
        conn.execute(
            "UPDATE videos SET
                title = ?,
                description = COALESCE(?, description),
                thumbnail_url = COALESCE(?, thumbnail_url),
                published_at = COALESCE(?, published_at),
                tags = ?,
                duration = ?,
                view_count = ?
             WHERE id = ?",
            params![
                video.title,
                video.description,
                video.thumbnail_url,
                video.published_at,
                tags_json,
                video.duration_seconds,
                video.view_count,
                id
            ],
        )?;
        Ok(())
    }

    pub fn set_video_speaker(&self, video_id: i64, speaker_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE videos SET speaker_id = ? WHERE id = ?",
            params![speaker_id, video_id],
        )?;
        if updated == 0 {
            bail!("video {} not found", video_id);
        }
        Ok(())
    }

    pub fn set_video_topic(&self, video_id: i64, topic_id: Option<i64>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE videos SET topic_id = ? WHERE id = ?",
            params![topic_id, video_id],
        )?;
        if updated == 0 {
            bail!("video {} not found", video_id);
        }
        Ok(())
    }

    /// Videos with no speaker yet, newest first - the auto-assignment sweep
    /// works through these.
    pub fn get_unassigned_videos(&self) -> Result<Vec<(i64, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title FROM videos
             WHERE speaker_id IS NULL
             ORDER BY published_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Videos sharing the given video's speaker or topic, newest first.
    pub fn get_suggested_videos(&self, video_id: i64, limit: i64) -> Result<Vec<Video>> {
        let Some(video) = self.get_video_by_id(video_id)? else {
            return Ok(Vec::new());
        };
        let speaker_id = video.speaker.map(|s| s.id).unwrap_or(0);
        let topic_id = video.topic.map(|t| t.id).unwrap_or(0);

        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "{VIDEO_SELECT}
             WHERE v.id != ? AND (v.speaker_id = ? OR v.topic_id = ?)
             ORDER BY v.published_at DESC, v.id DESC
             LIMIT ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let videos = stmt
            .query_map(params![video_id, speaker_id, topic_id, limit], map_video_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(videos)
    }

    // ========================================================================
    // Speakers
    // ========================================================================

    /// All speakers with their derived video counts, ordered by name.
    pub fn get_speakers(&self) -> Result<Vec<Speaker>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{SPEAKER_SELECT} GROUP BY s.id ORDER BY s.name ASC"))?;
        let speakers = stmt
            .query_map([], map_speaker_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(speakers)
    }

    pub fn get_speaker_by_id(&self, id: i64) -> Result<Option<Speaker>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{SPEAKER_SELECT} WHERE s.id = ? GROUP BY s.id");
        let speaker = conn.query_row(&sql, params![id], map_speaker_row).optional()?;
        Ok(speaker)
    }

    pub fn get_speaker_by_slug(&self, slug: &str) -> Result<Option<Speaker>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{SPEAKER_SELECT} WHERE s.slug = ? GROUP BY s.id");
        let speaker = conn.query_row(&sql, params![slug], map_speaker_row).optional()?;
        Ok(speaker)
    }

    pub fn create_speaker(
        &self,
        name: &str,
        slug: &str,
        bio: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO speakers (name, slug, bio, photo_url) VALUES (?, ?, ?, ?)",
            params![name, slug, bio, photo_url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_speaker(
        &self,
        id: i64,
        name: &str,
        slug: &str,
        bio: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE speakers SET name = ?, slug = ?, bio = ?, photo_url = ?, updated_at = datetime('now')
             WHERE id = ?",
            params![name, slug, bio, photo_url, id],
        )?;
        if updated == 0 {
            bail!("speaker {} not found", id);
        }
        Ok(())
    }

    pub fn count_videos_for_speaker(&self, speaker_id: i64) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE speaker_id = ?",
            params![speaker_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Merge one speaker into another: every video of `source_id` is
    /// re-pointed to `keeper_id`, then the source record is deleted - both
    /// inside a single transaction, so a half-done merge cannot be observed.
    ///
    /// Returns `None` when the source no longer exists, which makes a
    /// repeated merge of the same pair a no-op.
    pub fn merge_speakers(&self, keeper_id: i64, source_id: i64) -> Result<Option<MergeOutcome>> {
        if keeper_id == source_id {
            bail!("cannot merge speaker {} into itself", keeper_id);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let keeper_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM speakers WHERE id = ?",
            params![keeper_id],
            |row| row.get(0),
        )?;
        if keeper_exists == 0 {
            bail!("keeper speaker {} not found", keeper_id);
        }

        let source_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM speakers WHERE id = ?",
            params![source_id],
            |row| row.get(0),
        )?;
        if source_exists == 0 {
            return Ok(None);
        }

        let videos_moved = tx.execute(
            "UPDATE videos SET speaker_id = ? WHERE speaker_id = ?",
            params![keeper_id, source_id],
        )? as i64;
        tx.execute("DELETE FROM speakers WHERE id = ?", params![source_id])?;
        tx.commit()?;

        Ok(Some(MergeOutcome { videos_moved }))
    }

    // ========================================================================
    // Topics
    // ========================================================================

    pub fn get_topics(&self) -> Result<Vec<Topic>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{TOPIC_SELECT} GROUP BY t.id ORDER BY t.name ASC"))?;
        let topics = stmt
            .query_map([], map_topic_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(topics)
    }

    pub fn get_topic_by_id(&self, id: i64) -> Result<Option<Topic>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{TOPIC_SELECT} WHERE t.id = ? GROUP BY t.id");
        let topic = conn.query_row(&sql, params![id], map_topic_row).optional()?;
        Ok(topic)
    }

    pub fn get_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("{TOPIC_SELECT} WHERE t.slug = ? GROUP BY t.id");
        let topic = conn.query_row(&sql, params![slug], map_topic_row).optional()?;
        Ok(topic)
    }

    pub fn create_topic(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO topics (name, slug, description, color) VALUES (?, ?, ?, ?)",
            params![name, slug, description, color],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_topic(
        &self,
        id: i64,
        name: &str,
        slug: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE topics SET name = ?, slug = ?, description = ?, color = ? WHERE id = ?",
            params![name, slug, description, color, id],
        )?;
        if updated == 0 {
            bail!("topic {} not found", id);
        }
        Ok(())
    }

    /// Deleting a topic leaves its videos unclassified (the reference is
    /// nulled, never cascaded).
    pub fn delete_topic(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE videos SET topic_id = NULL WHERE topic_id = ?", params![id])?;
        let deleted = conn.execute("DELETE FROM topics WHERE id = ?", params![id])?;
        if deleted == 0 {
            bail!("topic {} not found", id);
        }
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

const VIDEO_SELECT: &str = "SELECT v.id, v.youtube_id, v.title, v.description, v.thumbnail_url,
            v.published_at, v.tags, v.duration, v.view_count,
            s.id, s.name, s.slug, s.photo_url,
            t.id, t.name, t.slug, t.color
     FROM videos v
     LEFT JOIN speakers s ON v.speaker_id = s.id
     LEFT JOIN topics t ON v.topic_id = t.id";

const SPEAKER_SELECT: &str = "SELECT s.id, s.name, s.slug, s.bio, s.photo_url, s.background_images,
            s.created_at, s.updated_at, COUNT(v.id)
     FROM speakers s
     LEFT JOIN videos v ON v.speaker_id = s.id";

const TOPIC_SELECT: &str = "SELECT t.id, t.name, t.slug, t.description, t.color, t.created_at, COUNT(v.id)
     FROM topics t
     LEFT JOIN videos v ON v.topic_id = t.id";

fn map_video_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Video> {
    let tags_json: String = row.get(6)?;
    let speaker = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(SpeakerRef {
            id,
            name: row.get(10)?,
            slug: row.get(11)?,
            photo_url: row.get(12)?,
        }),
        None => None,
    };
    let topic = match row.get::<_, Option<i64>>(13)? {
        Some(id) => Some(TopicRef {
            id,
            name: row.get(14)?,
            slug: row.get(15)?,
            color: row.get(16)?,
        }),
        None => None,
    };

    Ok(Video {
        id: row.get(0)?,
        youtube_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        thumbnail_url: row.get(4)?,
        published_at: row.get(5)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        duration_seconds: row.get(7)?,
        view_count: row.get(8)?,
        speaker,
        topic,
    })
}

fn map_speaker_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Speaker> {
    let images_json: String = row.get(5)?;
    Ok(Speaker {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        bio: row.get(3)?,
        photo_url: row.get(4)?,
        background_images: serde_json::from_str(&images_json).unwrap_or_default(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        video_count: row.get(8)?,
    })
}

fn map_topic_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        created_at: row.get(5)?,
        video_count: row.get(6)?,
    })
}

// ============================================================================
// Predicate translation
// ============================================================================

/// Register the scalar functions the search predicate relies on: `norm_text`
/// (case/accent folding) and `date_renderings` (every human-readable form of
/// a publish date, newline-separated). Both are deterministic, so SQLite may
/// cache their results within a statement.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "norm_text",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            Ok(strip_accents_lower(&text))
        },
    )?;
    conn.create_scalar_function(
        "date_renderings",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let published_at: String = ctx.get(0)?;
            Ok(date_renderings(&published_at))
        },
    )?;
    Ok(())
}

/// Translate a predicate tree into a SQL condition, pushing the needles and
/// ids into `bound` as positional parameters.
fn predicate_to_sql(predicate: &Predicate, bound: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Contains { field, needle } => {
            bound.push(Value::Text(needle.clone()));
            format!("{} LIKE '%' || ? || '%'", field_expr(*field))
        }
        Predicate::SpeakerIs(id) => {
            bound.push(Value::Integer(*id));
            "v.speaker_id = ?".to_string()
        }
        Predicate::TopicIs(id) => {
            bound.push(Value::Integer(*id));
            "v.topic_id = ?".to_string()
        }
        Predicate::And(parts) => join_parts(parts, " AND ", bound),
        Predicate::Or(parts) => join_parts(parts, " OR ", bound),
    }
}

fn join_parts(parts: &[Predicate], separator: &str, bound: &mut Vec<Value>) -> String {
    let rendered: Vec<String> = parts.iter().map(|p| predicate_to_sql(p, bound)).collect();
    format!("({})", rendered.join(separator))
}

fn field_expr(field: Field) -> &'static str {
    match field {
        Field::Title => "norm_text(v.title)",
        Field::Description => "norm_text(COALESCE(v.description, ''))",
        Field::SpeakerName => "norm_text(COALESCE(s.name, ''))",
        Field::TopicName => "norm_text(COALESCE(t.name, ''))",
        Field::Tags => "norm_text(COALESCE(v.tags, ''))",
        Field::PublishedRenderings => "date_renderings(COALESCE(v.published_at, ''))",
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
