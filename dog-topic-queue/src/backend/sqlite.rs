use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::{
    QueueResult, QueueError, JobId, JobRecord, Payload, StatKind, TopicStats,
    backend::{QueueBackend, JobFilter, JobUpdate, JobSort},
};

const JOB_COLUMNS: &str =
    "id, topic, payload, done, error, retries, blocked_until, worker_id, worker_hostname, created_at";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS queue_jobs (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        topic TEXT NOT NULL,
        payload TEXT NOT NULL,
        done BOOLEAN NOT NULL DEFAULT 0,
        error TEXT,
        retries INTEGER NOT NULL DEFAULT 0,
        blocked_until INTEGER,
        worker_id TEXT,
        worker_hostname TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS queue_jobs_lease_idx ON queue_jobs (topic, done, created_at)",
    "CREATE TABLE IF NOT EXISTS queue_stats (
        topic TEXT PRIMARY KEY,
        added INTEGER NOT NULL DEFAULT 0,
        getted INTEGER NOT NULL DEFAULT 0,
        failed INTEGER NOT NULL DEFAULT 0,
        done INTEGER NOT NULL DEFAULT 0
    )",
];

#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: String,
    topic: String,
    payload: String, // JSON as TEXT
    done: bool,
    error: Option<String>,
    retries: i64,
    blocked_until: Option<i64>,
    worker_id: Option<String>,
    worker_hostname: Option<String>,
    created_at: i64,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let payload: Payload = serde_json::from_str(&row.payload)?;
        Ok(JobRecord {
            id: JobId::from(row.id),
            topic: row.topic,
            payload,
            done: row.done,
            error: row.error,
            retries: u32::try_from(row.retries)
                .map_err(|_| QueueError::store(format!("Corrupt retries column: {}", row.retries)))?,
            blocked_until: row.blocked_until.map(from_millis).transpose()?,
            worker_id: row.worker_id,
            worker_hostname: row.worker_hostname,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct StatsRow {
    topic: String,
    added: i64,
    getted: i64,
    failed: i64,
    done: i64,
}

impl From<StatsRow> for TopicStats {
    fn from(row: StatsRow) -> Self {
        Self {
            topic: row.topic,
            added: row.added.max(0) as u64,
            getted: row.getted.max(0) as u64,
            failed: row.failed.max(0) as u64,
            done: row.done.max(0) as u64,
        }
    }
}

fn from_millis(millis: i64) -> QueueResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| QueueError::store(format!("Timestamp out of range: {}", millis)))
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &JobFilter) {
    match filter {
        JobFilter::All => {
            builder.push(" WHERE 1 = 1");
        }
        JobFilter::ById(id) => {
            builder.push(" WHERE id = ");
            builder.push_bind(id.as_str().to_string());
        }
        JobFilter::Leasable { topic, now, max_retries } => {
            builder.push(" WHERE topic = ");
            builder.push_bind(topic.clone());
            builder.push(" AND done = 0 AND (blocked_until IS NULL OR blocked_until <= ");
            builder.push_bind(now.timestamp_millis());
            builder.push(") AND retries <= ");
            builder.push_bind(i64::from(*max_retries));
        }
        JobFilter::Finished { max_retries } => {
            builder.push(" WHERE (done = 1 OR retries > ");
            builder.push_bind(i64::from(*max_retries));
            builder.push(")");
        }
    }
}

fn push_update(builder: &mut QueryBuilder<'_, Sqlite>, update: &JobUpdate) {
    match update {
        JobUpdate::Lease { blocked_until, worker_id, worker_hostname } => {
            builder.push("SET blocked_until = ");
            builder.push_bind(blocked_until.timestamp_millis());
            builder.push(", worker_id = ");
            builder.push_bind(worker_id.clone());
            builder.push(", worker_hostname = ");
            builder.push_bind(worker_hostname.clone());
            builder.push(", retries = retries + 1");
        }
        JobUpdate::Ack => {
            builder.push("SET done = 1");
        }
        JobUpdate::Fail { error, done } => {
            builder.push("SET error = ");
            builder.push_bind(error.clone());
            builder.push(", done = ");
            builder.push_bind(*done);
        }
    }
}

/// Durable backend on SQLite
#[derive(Clone)]
pub struct SqliteBackend {
    pub(crate) pool: SqlitePool,
}

impl SqliteBackend {
    /// Wrap an existing pool; call [`SqliteBackend::migrate`] before use
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` (e.g. `sqlite://queue.db?mode=rwc`) and create the schema
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        let backend = Self::with_pool(pool);
        backend.migrate().await?;
        Ok(backend)
    }

    /// Private in-memory database, for tests
    ///
    /// A single connection keeps every query on the same database.
    pub async fn in_memory() -> QueueResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let backend = Self::with_pool(pool);
        backend.migrate().await?;
        Ok(backend)
    }

    /// Create tables and indexes if missing
    pub async fn migrate(&self) -> QueueResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("SQLite queue schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueueBackend for SqliteBackend {
    #[instrument(skip_all, err, fields(topic = %record.topic, job_id = %record.id))]
    async fn insert(&self, record: JobRecord) -> QueueResult<JobRecord> {
        let payload_text = serde_json::to_string(&record.payload)?;

        sqlx::query(
            "INSERT INTO queue_jobs (id, topic, payload, done, error, retries, blocked_until, worker_id, worker_hostname, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(record.id.as_str())
        .bind(&record.topic)
        .bind(payload_text)
        .bind(record.done)
        .bind(&record.error)
        .bind(i64::from(record.retries))
        .bind(record.blocked_until.map(|at| at.timestamp_millis()))
        .bind(&record.worker_id)
        .bind(&record.worker_hostname)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    #[instrument(skip_all, err)]
    async fn find_one_and_update(
        &self,
        filter: JobFilter,
        update: JobUpdate,
        sort: JobSort,
    ) -> QueueResult<Option<JobRecord>> {
        // One statement: SQLite serializes writers, so select and update cannot interleave
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE queue_jobs ");
        push_update(&mut builder, &update);
        builder.push(" WHERE seq = (SELECT seq FROM queue_jobs");
        push_filter(&mut builder, &filter);
        if sort == JobSort::Oldest {
            builder.push(" ORDER BY created_at ASC, seq ASC");
        }
        builder.push(" LIMIT 1) RETURNING ");
        builder.push(JOB_COLUMNS);

        let row = builder
            .build_query_as::<JobRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRecord::try_from).transpose()
    }

    #[instrument(skip_all, err)]
    async fn find(&self, filter: JobFilter) -> QueueResult<Vec<JobRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(JOB_COLUMNS);
        builder.push(" FROM queue_jobs");
        push_filter(&mut builder, &filter);
        builder.push(" ORDER BY created_at ASC, seq ASC");

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    #[instrument(skip_all, err)]
    async fn delete_many(&self, filter: JobFilter) -> QueueResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM queue_jobs");
        push_filter(&mut builder, &filter);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn increment_stat(&self, topic: &str, kind: StatKind) -> QueueResult<TopicStats> {
        // Column names come from a closed enum, never from input
        let column = kind.name();
        let statement = format!(
            "INSERT INTO queue_stats (topic, {column}) VALUES (?1, 1)
             ON CONFLICT(topic) DO UPDATE SET {column} = {column} + 1
             RETURNING topic, added, getted, failed, done"
        );

        let row = sqlx::query_as::<_, StatsRow>(&statement)
            .bind(topic)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn topic_stats(&self, topic: &str) -> QueueResult<Option<TopicStats>> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT topic, added, getted, failed, done FROM queue_stats WHERE topic = ?1",
        )
        .bind(topic)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TopicStats::from))
    }

    async fn all_stats(&self) -> QueueResult<Vec<TopicStats>> {
        let rows = sqlx::query_as::<_, StatsRow>(
            "SELECT topic, added, getted, failed, done FROM queue_stats ORDER BY topic ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TopicStats::from).collect())
    }
}
