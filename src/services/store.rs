//! The persistent store: a single SQLite file holding the media library,
//! station configuration mirror, play history, and the per-station
//! programming cursor (`station_state`).
//!
//! Schema and migration behavior are grounded directly in the original
//! implementation's `radio/db.py`: legacy column/table names are tolerated
//! rather than rejected, since a station's TOML can long outlive the binary
//! that first created its database.

use std::path::Path;

use rand::seq::SliceRandom;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, Result};
use crate::models::{Media, MediaKind, Play, StationConfig, StationRow, StationState};

const SCHEMA: &str = r#"
PRAGMA foreign_keys=ON;

CREATE TABLE IF NOT EXISTS media (
  id INTEGER PRIMARY KEY,
  path TEXT NOT NULL UNIQUE,
  kind TEXT NOT NULL CHECK(kind IN ('song','commercial','ident','noise','overlay','top_of_hour')),
  artist TEXT,
  title TEXT,
  tag TEXT,
  duration_s REAL,
  mtime INTEGER
);

CREATE TABLE IF NOT EXISTS stations (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  freq REAL NOT NULL,
  idents_dir TEXT,
  commercials_dir TEXT,
  break_frequency_s INTEGER DEFAULT 0,
  break_length_s INTEGER DEFAULT 0,
  ident_frequency_s INTEGER DEFAULT 0,
  overlay_pad_s REAL DEFAULT 0,
  overlay_duck REAL DEFAULT 0.4,
  overlay_ramp_s REAL DEFAULT 0.5
);

CREATE TABLE IF NOT EXISTS station_media (
  station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
  media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
  last_played_ts REAL DEFAULT 0,
  PRIMARY KEY (station_id, media_id)
);

CREATE TABLE IF NOT EXISTS plays (
  id INTEGER PRIMARY KEY,
  station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
  media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
  kind TEXT NOT NULL,
  started_ts REAL NOT NULL,
  ended_ts REAL
);

CREATE TABLE IF NOT EXISTS station_state (
  station_id INTEGER PRIMARY KEY REFERENCES stations(id) ON DELETE CASCADE,
  current_media_id INTEGER REFERENCES media(id),
  kind TEXT,
  started_ts REAL,
  ends_ts REAL,

  queue_json TEXT,
  queue_index INTEGER DEFAULT 0,

  pending_break INTEGER DEFAULT 0,
  last_break_ts REAL DEFAULT 0,
  force_ident_next INTEGER DEFAULT 0,
  last_ident_ts REAL DEFAULT 0,
  last_toth_slot_ts REAL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS station_overlays (
  id INTEGER PRIMARY KEY,
  station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
  schedule_key TEXT NOT NULL,
  overlays_dir TEXT NOT NULL,
  overlays_probability REAL DEFAULT 0.0,
  UNIQUE(station_id, schedule_key)
);

CREATE INDEX IF NOT EXISTS idx_media_kind_tag ON media(kind, tag);
CREATE INDEX IF NOT EXISTS idx_media_song_tag_dur ON media(kind, tag, duration_s);
CREATE INDEX IF NOT EXISTS idx_plays_station_time ON plays(station_id, started_ts);
CREATE INDEX IF NOT EXISTS idx_station_media_last_played ON station_media(station_id, last_played_ts);
"#;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Config(format!("creating db directory: {e}")))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the underlying connection pool, flushing the WAL. Called on
    /// graceful shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await.map_err(|e| {
            // SCHEMA is a multi-statement script; sqlite's sqlx driver executes
            // each ;-separated statement in turn via `execute`.
            AppError::Database(e)
        })?;

        self.ensure_column("station_state", "queue_json", "TEXT").await?;
        self.ensure_column("station_state", "queue_index", "INTEGER DEFAULT 0").await?;
        self.ensure_column("station_state", "last_ident_ts", "REAL DEFAULT 0").await?;
        self.ensure_column("station_state", "last_toth_slot_ts", "REAL DEFAULT 0").await?;
        self.ensure_column("station_media", "last_played_ts", "REAL DEFAULT 0").await?;

        self.migrate_overlay_columns().await?;
        self.migrate_legacy_overlays_table().await?;

        Ok(())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
    }

    async fn ensure_column(&self, table: &str, col: &str, decl: &str) -> Result<()> {
        let cols = self.table_columns(table).await?;
        if !cols.iter().any(|c| c == col) {
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {col} {decl}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Older databases kept these as `ident_pad_s`/`ident_duck`/`ident_ramp_s`.
    async fn migrate_overlay_columns(&self) -> Result<()> {
        let cols = self.table_columns("stations").await?;
        if !cols.iter().any(|c| c == "overlay_pad_s") {
            sqlx::query("ALTER TABLE stations ADD COLUMN overlay_pad_s REAL DEFAULT 0")
                .execute(&self.pool)
                .await?;
            if cols.iter().any(|c| c == "ident_pad_s") {
                sqlx::query("UPDATE stations SET overlay_pad_s = ident_pad_s")
                    .execute(&self.pool)
                    .await?;
            }
        }
        if !cols.iter().any(|c| c == "overlay_duck") {
            sqlx::query("ALTER TABLE stations ADD COLUMN overlay_duck REAL DEFAULT 0.4")
                .execute(&self.pool)
                .await?;
            if cols.iter().any(|c| c == "ident_duck") {
                sqlx::query("UPDATE stations SET overlay_duck = ident_duck")
                    .execute(&self.pool)
                    .await?;
            }
        }
        if !cols.iter().any(|c| c == "overlay_ramp_s") {
            sqlx::query("ALTER TABLE stations ADD COLUMN overlay_ramp_s REAL DEFAULT 0.5")
                .execute(&self.pool)
                .await?;
            if cols.iter().any(|c| c == "ident_ramp_s") {
                sqlx::query("UPDATE stations SET overlay_ramp_s = ident_ramp_s")
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// `station_interstitials` -> `station_overlays`, with its two renamed columns.
    async fn migrate_legacy_overlays_table(&self) -> Result<()> {
        let tables: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table'",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|r| r.get::<String, _>("name"))
        .collect();

        if tables.iter().any(|t| t == "station_interstitials")
            && !tables.iter().any(|t| t == "station_overlays")
        {
            sqlx::query("ALTER TABLE station_interstitials RENAME TO station_overlays")
                .execute(&self.pool)
                .await?;
        }

        if tables.iter().any(|t| t == "station_overlays" || t == "station_interstitials") {
            let cols = self.table_columns("station_overlays").await.unwrap_or_default();
            if cols.iter().any(|c| c == "interstitials_dir") && !cols.iter().any(|c| c == "overlays_dir") {
                sqlx::query("ALTER TABLE station_overlays RENAME COLUMN interstitials_dir TO overlays_dir")
                    .execute(&self.pool)
                    .await?;
            }
            if cols.iter().any(|c| c == "interstitials_probability")
                && !cols.iter().any(|c| c == "overlays_probability")
            {
                sqlx::query(
                    "ALTER TABLE station_overlays RENAME COLUMN interstitials_probability TO overlays_probability",
                )
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    // -------------------- media / station upserts --------------------

    pub async fn upsert_media(&self, media: &Media) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO media(path, kind, artist, title, tag, duration_s, mtime)
            VALUES(?,?,?,?,?,?,?)
            ON CONFLICT(path) DO UPDATE SET
              kind=excluded.kind, artist=excluded.artist, title=excluded.title,
              tag=excluded.tag, duration_s=excluded.duration_s, mtime=excluded.mtime
            "#,
        )
        .bind(&media.path)
        .bind(media.kind.as_str())
        .bind(&media.artist)
        .bind(&media.title)
        .bind(&media.tag)
        .bind(media.duration_s)
        .bind(media.mtime)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM media WHERE path=?")
            .bind(&media.path)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }

    pub async fn upsert_station(&self, cfg: &StationConfig) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO stations(
              name, freq, idents_dir, commercials_dir,
              break_frequency_s, break_length_s, ident_frequency_s,
              overlay_pad_s, overlay_duck, overlay_ramp_s
            )
            VALUES(?,?,?,?,?,?,?,?,?,?)
            ON CONFLICT(name) DO UPDATE SET
              freq=excluded.freq, idents_dir=excluded.idents_dir,
              commercials_dir=excluded.commercials_dir,
              break_frequency_s=excluded.break_frequency_s,
              break_length_s=excluded.break_length_s,
              ident_frequency_s=excluded.ident_frequency_s,
              overlay_pad_s=excluded.overlay_pad_s,
              overlay_duck=excluded.overlay_duck,
              overlay_ramp_s=excluded.overlay_ramp_s
            "#,
        )
        .bind(&cfg.name)
        .bind(cfg.freq)
        .bind(&cfg.idents_dir)
        .bind(&cfg.commercials_dir)
        .bind(cfg.break_frequency_s)
        .bind(cfg.break_length_s)
        .bind(cfg.ident_frequency_s)
        .bind(cfg.overlay_pad_s)
        .bind(cfg.overlay_duck)
        .bind(cfg.overlay_ramp_s)
        .execute(&self.pool)
        .await?;

        self.station_id(&cfg.name).await
    }

    pub async fn station_id(&self, name: &str) -> Result<i64> {
        let row = sqlx::query("SELECT id FROM stations WHERE name=?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station not in db: {name} (run scan_media first)")))?;
        Ok(row.get("id"))
    }

    pub async fn link_station_media(&self, station_id: i64, media_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO station_media(station_id, media_id) VALUES(?,?)")
            .bind(station_id)
            .bind(media_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_station_overlay(
        &self,
        station_id: i64,
        schedule_key: &str,
        overlays_dir: &str,
        overlays_probability: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO station_overlays(station_id, schedule_key, overlays_dir, overlays_probability)
            VALUES(?,?,?,?)
            ON CONFLICT(station_id, schedule_key) DO UPDATE SET
              overlays_dir=excluded.overlays_dir,
              overlays_probability=excluded.overlays_probability
            "#,
        )
        .bind(station_id)
        .bind(schedule_key)
        .bind(overlays_dir)
        .bind(overlays_probability)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_stations(&self) -> Result<Vec<StationRow>> {
        let rows = sqlx::query_as::<_, StationRow>("SELECT * FROM stations ORDER BY freq ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // -------------------- station media queries --------------------

    pub async fn random_station_media(&self, station_id: i64, kind: MediaKind) -> Result<Option<Media>> {
        let row = sqlx::query_as::<_, Media>(
            r#"
            SELECT m.id, m.path, m.kind, m.artist, m.title, m.tag, m.duration_s, m.mtime
            FROM media m JOIN station_media sm ON sm.media_id = m.id
            WHERE sm.station_id=? AND m.kind=?
            ORDER BY RANDOM() LIMIT 1
            "#,
        )
        .bind(station_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn random_station_media_filtered(
        &self,
        station_id: i64,
        kind: MediaKind,
        path_prefix: &str,
    ) -> Result<Option<Media>> {
        let like = format!("{path_prefix}%");
        let row = sqlx::query_as::<_, Media>(
            r#"
            SELECT m.id, m.path, m.kind, m.artist, m.title, m.tag, m.duration_s, m.mtime
            FROM media m JOIN station_media sm ON sm.media_id = m.id
            WHERE sm.station_id=? AND m.kind=? AND m.path LIKE ?
            ORDER BY RANDOM() LIMIT 1
            "#,
        )
        .bind(station_id)
        .bind(kind.as_str())
        .bind(like)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Pool of a station's media of `kind`, shuffled with the caller's RNG
    /// (rather than `ORDER BY RANDOM()`) so that callers with a seeded,
    /// per-station RNG get deterministic ordering.
    pub async fn station_media_pool(
        &self,
        station_id: i64,
        kind: MediaKind,
        limit: i64,
        rng: &mut impl rand::Rng,
    ) -> Result<Vec<Media>> {
        let mut rows = sqlx::query_as::<_, Media>(
            r#"
            SELECT m.id, m.path, m.kind, m.artist, m.title, m.tag, m.duration_s, m.mtime
            FROM media m JOIN station_media sm ON sm.media_id = m.id
            WHERE sm.station_id=? AND m.kind=?
            LIMIT ?
            "#,
        )
        .bind(station_id)
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.shuffle(rng);
        Ok(rows)
    }

    pub async fn media_by_id(&self, media_id: i64) -> Result<Option<Media>> {
        let row = sqlx::query_as::<_, Media>(
            "SELECT id, path, kind, artist, title, tag, duration_s, mtime FROM media WHERE id=?",
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn media_by_path(&self, path: &str) -> Result<Option<Media>> {
        let row = sqlx::query_as::<_, Media>(
            "SELECT id, path, kind, artist, title, tag, duration_s, mtime FROM media WHERE path=?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Best-fit song candidate pool: songs tagged with any of `tags`, no
    /// longer than `max_duration`, longest first, capped at `pool_limit`.
    pub async fn song_pool_by_tags(
        &self,
        tags: &[String],
        max_duration: f64,
        pool_limit: i64,
    ) -> Result<Vec<Media>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = std::iter::repeat("?").take(tags.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            r#"
            SELECT id, path, kind, artist, title, tag, duration_s, mtime
            FROM media
            WHERE kind='song' AND tag IN ({placeholders})
              AND duration_s IS NOT NULL AND duration_s > 1 AND duration_s <= ?
            ORDER BY duration_s DESC, id DESC
            LIMIT ?
            "#
        );
        let mut q = sqlx::query_as::<_, Media>(&sql);
        for tag in tags {
            q = q.bind(tag);
        }
        q = q.bind(max_duration).bind(pool_limit);
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Media ids currently playing on every station's cursor (used to build
    /// the avoid-set for song selection).
    pub async fn currently_playing_media_ids(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT current_media_id FROM station_state WHERE current_media_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("current_media_id")).collect())
    }

    // -------------------- station_state --------------------

    pub async fn get_station_state(&self, station_id: i64) -> Result<Option<StationState>> {
        let row = sqlx::query_as::<_, StationState>(
            r#"
            SELECT station_id, current_media_id, kind, started_ts, ends_ts,
                   queue_json, queue_index, pending_break, last_break_ts,
                   force_ident_next, last_ident_ts, last_toth_slot_ts
            FROM station_state WHERE station_id=?
            "#,
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_noise_state(&self, station_id: i64, now_ts: f64, ends_ts: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO station_state(station_id, current_media_id, kind, started_ts, ends_ts, queue_json, queue_index)
            VALUES(?, NULL, 'noise', ?, ?, NULL, 0)
            ON CONFLICT(station_id) DO UPDATE SET
              current_media_id=NULL, kind='noise', started_ts=excluded.started_ts,
              ends_ts=excluded.ends_ts, queue_json=NULL, queue_index=0
            "#,
        )
        .bind(station_id)
        .bind(now_ts)
        .bind(ends_ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_station_state(
        &self,
        station_id: i64,
        media_id: i64,
        kind: MediaKind,
        started_ts: f64,
        ends_ts: f64,
        queue_json: Option<&str>,
        queue_index: i64,
        pending_break: bool,
        last_break_ts: f64,
        force_ident_next: bool,
        last_ident_ts: f64,
        last_toth_slot_ts: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO station_state(
              station_id, current_media_id, kind, started_ts, ends_ts,
              queue_json, queue_index, pending_break, last_break_ts,
              force_ident_next, last_ident_ts, last_toth_slot_ts
            )
            VALUES(?,?,?,?,?,?,?,?,?,?,?,?)
            ON CONFLICT(station_id) DO UPDATE SET
              current_media_id=excluded.current_media_id, kind=excluded.kind,
              started_ts=excluded.started_ts, ends_ts=excluded.ends_ts,
              queue_json=excluded.queue_json, queue_index=excluded.queue_index,
              pending_break=excluded.pending_break, last_break_ts=excluded.last_break_ts,
              force_ident_next=excluded.force_ident_next, last_ident_ts=excluded.last_ident_ts,
              last_toth_slot_ts=excluded.last_toth_slot_ts
            "#,
        )
        .bind(station_id)
        .bind(media_id)
        .bind(kind.as_str())
        .bind(started_ts)
        .bind(ends_ts)
        .bind(queue_json)
        .bind(queue_index)
        .bind(pending_break)
        .bind(last_break_ts)
        .bind(force_ident_next)
        .bind(last_ident_ts)
        .bind(last_toth_slot_ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts the programming cursor and appends the matching history row
    /// in one transaction, so a crash between the two can never leave
    /// `station_state` pointing at an item `plays` has no record of.
    #[allow(clippy::too_many_arguments)]
    pub async fn advance_station_state(
        &self,
        station_id: i64,
        media_id: i64,
        kind: MediaKind,
        started_ts: f64,
        ends_ts: f64,
        queue_json: Option<&str>,
        queue_index: i64,
        pending_break: bool,
        last_break_ts: f64,
        force_ident_next: bool,
        last_ident_ts: f64,
        last_toth_slot_ts: f64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO station_state(
              station_id, current_media_id, kind, started_ts, ends_ts,
              queue_json, queue_index, pending_break, last_break_ts,
              force_ident_next, last_ident_ts, last_toth_slot_ts
            )
            VALUES(?,?,?,?,?,?,?,?,?,?,?,?)
            ON CONFLICT(station_id) DO UPDATE SET
              current_media_id=excluded.current_media_id, kind=excluded.kind,
              started_ts=excluded.started_ts, ends_ts=excluded.ends_ts,
              queue_json=excluded.queue_json, queue_index=excluded.queue_index,
              pending_break=excluded.pending_break, last_break_ts=excluded.last_break_ts,
              force_ident_next=excluded.force_ident_next, last_ident_ts=excluded.last_ident_ts,
              last_toth_slot_ts=excluded.last_toth_slot_ts
            "#,
        )
        .bind(station_id)
        .bind(media_id)
        .bind(kind.as_str())
        .bind(started_ts)
        .bind(ends_ts)
        .bind(queue_json)
        .bind(queue_index)
        .bind(pending_break)
        .bind(last_break_ts)
        .bind(force_ident_next)
        .bind(last_ident_ts)
        .bind(last_toth_slot_ts)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO plays(station_id, media_id, kind, started_ts, ended_ts) VALUES(?,?,?,?,NULL)")
            .bind(station_id)
            .bind(media_id)
            .bind(kind.as_str())
            .bind(started_ts)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Upserts rather than updates: a station with no cursor row yet still
    /// needs to be marked break-due so the next `ensure_station_current`
    /// picks it up.
    pub async fn update_break_due(&self, station_id: i64, pending_break: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO station_state(station_id, pending_break) VALUES(?, ?)
            ON CONFLICT(station_id) DO UPDATE SET pending_break=excluded.pending_break
            "#,
        )
        .bind(station_id)
        .bind(pending_break)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_play(&self, station_id: i64, media_id: i64, kind: MediaKind, started_ts: f64) -> Result<()> {
        sqlx::query("INSERT INTO plays(station_id, media_id, kind, started_ts, ended_ts) VALUES(?,?,?,?,NULL)")
            .bind(station_id)
            .bind(media_id)
            .bind(kind.as_str())
            .bind(started_ts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn recent_plays(&self, station_id: i64, limit: i64) -> Result<Vec<Play>> {
        let rows = sqlx::query_as::<_, Play>(
            "SELECT id, station_id, media_id, kind, started_ts, ended_ts FROM plays WHERE station_id=? ORDER BY started_ts DESC LIMIT ?",
        )
        .bind(station_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
