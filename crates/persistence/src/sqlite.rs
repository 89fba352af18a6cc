//! SQLite-backed store using `sqlx`.

use crate::{IdentityReturn, InsertOutcome, NamePoolProvider, PersistenceError, RecordStore};
use chrono::NaiveDateTime;
use roster_core::{
    ConfigError, Grade, NamePool, PlayerRecord, Position, TrainableStats, UntrainableStats,
    STATS_PER_GROUP,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEADING_COLUMNS: [&str; 5] = ["user_id", "player_name", "age", "height_cm", "position"];
const TRAILING_COLUMNS: [&str; 5] = [
    "untrainable_sum",
    "overall_grade",
    "training_points",
    "created_at",
    "start_salary",
];
const PLAYER_COLUMN_COUNT: usize =
    LEADING_COLUMNS.len() + 2 * STATS_PER_GROUP + TRAILING_COLUMNS.len();
/// SQLite's default SQLITE_MAX_VARIABLE_NUMBER since 3.32.
const MAX_BIND_PARAMS: usize = 32_766;
const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / PLAYER_COLUMN_COUNT;

/// Column list of `players_basic` in bind order.
fn player_columns() -> Vec<&'static str> {
    LEADING_COLUMNS
        .into_iter()
        .chain(UntrainableStats::KEYS)
        .chain(TrainableStats::KEYS)
        .chain(TRAILING_COLUMNS)
        .collect()
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Create the parent directory of a file-backed SQLite URL.
pub(crate) fn ensure_parent_dir(url: &str) -> std::io::Result<()> {
    if is_memory_url(url) {
        return Ok(());
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .map(|p| p.split('?').next().unwrap_or(p));
    if let Some(parent) = path.and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Open (creating if missing) the database at `url` and apply the schema.
pub async fn init_db(url: &str) -> Result<SqlitePool, PersistenceError> {
    ensure_parent_dir(url)?;
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = if is_memory_url(url) {
        // Every connection to :memory: is a separate database; keep exactly one alive.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(options).await?
    };
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "database ready");
    Ok(pool)
}

fn insert_statement(rows: &[PlayerRecord]) -> QueryBuilder<'_, Sqlite> {
    let mut qb = QueryBuilder::new("INSERT INTO players_basic (");
    qb.push(player_columns().join(", "));
    qb.push(") ");
    qb.push_values(rows, |mut b, p| {
        b.push_bind(p.owner_id)
            .push_bind(p.name.as_str())
            .push_bind(i64::from(p.age))
            .push_bind(i64::from(p.height_cm))
            .push_bind(p.position.label());
        for (_, value) in p.all_stats() {
            b.push_bind(i64::from(value));
        }
        b.push_bind(i64::from(p.untrainable_sum))
            .push_bind(p.overall_grade.label())
            .push_bind(i64::from(p.training_points))
            .push_bind(p.created_at.format(TIMESTAMP_FORMAT).to_string())
            .push_bind(p.start_salary);
    });
    qb
}

/// Insert one record and return its `player_id`.
pub async fn insert_player(pool: &SqlitePool, p: &PlayerRecord) -> Result<i64, PersistenceError> {
    let mut qb = insert_statement(std::slice::from_ref(p));
    let done = qb.build().execute(pool).await?;
    Ok(done.last_insert_rowid())
}

/// Insert `rows` inside one transaction.
///
/// Rows are split into statements small enough for SQLite's bind limit;
/// either all of them commit or none do.
pub async fn insert_players(
    pool: &SqlitePool,
    rows: &[PlayerRecord],
    identities: IdentityReturn,
) -> Result<InsertOutcome, PersistenceError> {
    if rows.is_empty() {
        return Ok(match identities {
            IdentityReturn::Ids => InsertOutcome::Ids(Vec::new()),
            IdentityReturn::AffectedCount => InsertOutcome::Affected(0),
        });
    }
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(rows.len());
    let mut affected = 0u64;
    for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb = insert_statement(chunk);
        match identities {
            IdentityReturn::Ids => {
                qb.push(" RETURNING player_id");
                let returned = qb.build().fetch_all(&mut *tx).await?;
                let mut chunk_ids = returned
                    .iter()
                    .map(|r| r.try_get::<i64, _>(0))
                    .collect::<Result<Vec<_>, _>>()?;
                // RETURNING order is unspecified; rowids are assigned ascending.
                chunk_ids.sort_unstable();
                ids.extend(chunk_ids);
            }
            IdentityReturn::AffectedCount => {
                affected += qb.build().execute(&mut *tx).await?.rows_affected();
            }
        }
    }
    tx.commit().await?;
    debug!(rows = rows.len(), "batch committed");
    Ok(match identities {
        IdentityReturn::Ids => InsertOutcome::Ids(ids),
        IdentityReturn::AffectedCount => InsertOutcome::Affected(affected),
    })
}

/// Read the first/last name tables, skipping blank rows.
pub async fn load_name_texts(
    pool: &SqlitePool,
) -> Result<(Vec<String>, Vec<String>), PersistenceError> {
    let first: Vec<String> = sqlx::query_scalar("SELECT text FROM players_first_name ORDER BY id")
        .fetch_all(pool)
        .await?;
    let last: Vec<String> = sqlx::query_scalar("SELECT text FROM players_last_name ORDER BY id")
        .fetch_all(pool)
        .await?;
    let keep = |names: Vec<String>| -> Vec<String> {
        names.into_iter().filter(|s| !s.trim().is_empty()).collect()
    };
    Ok((keep(first), keep(last)))
}

/// Append a pool's names to the name tables. Returns the rows written.
pub async fn seed_name_pool(pool: &SqlitePool, names: &NamePool) -> Result<u64, PersistenceError> {
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for (table, list) in [
        ("players_first_name", names.first_names()),
        ("players_last_name", names.last_names()),
    ] {
        for chunk in list.chunks(MAX_BIND_PARAMS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO ");
            qb.push(table).push(" (text) ");
            qb.push_values(chunk, |mut b, name| {
                b.push_bind(name.as_str());
            });
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }
    }
    tx.commit().await?;
    Ok(written)
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Corrupt(format!("{column}: {detail}"))
}

fn player_from_row(row: &SqliteRow) -> Result<(i64, PlayerRecord), PersistenceError> {
    let int = |column: &str| -> Result<i64, PersistenceError> { Ok(row.try_get(column)?) };
    let narrow = |column: &str| -> Result<u8, PersistenceError> {
        let v = int(column)?;
        u8::try_from(v).map_err(|e| corrupt(column, e))
    };

    let mut untrainable = [0u8; STATS_PER_GROUP];
    for (slot, column) in untrainable.iter_mut().zip(UntrainableStats::KEYS) {
        *slot = narrow(column)?;
    }
    let mut trainable = [0u8; STATS_PER_GROUP];
    for (slot, column) in trainable.iter_mut().zip(TrainableStats::KEYS) {
        *slot = narrow(column)?;
    }

    let position: String = row.try_get("position")?;
    let grade: String = row.try_get("overall_grade")?;
    let created_at: String = row.try_get("created_at")?;
    let record = PlayerRecord {
        owner_id: int("user_id")?,
        name: row.try_get("player_name")?,
        age: narrow("age")?,
        height_cm: u16::try_from(int("height_cm")?).map_err(|e| corrupt("height_cm", e))?,
        position: Position::from_str(&position).map_err(|e| corrupt("position", e))?,
        untrainable: UntrainableStats::from_array(untrainable),
        trainable: TrainableStats::from_array(trainable),
        untrainable_sum: u32::try_from(int("untrainable_sum")?)
            .map_err(|e| corrupt("untrainable_sum", e))?,
        overall_grade: Grade::from_str(&grade).map_err(|e| corrupt("overall_grade", e))?,
        training_points: u32::try_from(int("training_points")?)
            .map_err(|e| corrupt("training_points", e))?,
        start_salary: int("start_salary")?,
        created_at: NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT)
            .map_err(|e| corrupt("created_at", e))?,
    };
    Ok((int("player_id")?, record))
}

/// Load an owner's players ordered by identity.
pub async fn load_players(
    pool: &SqlitePool,
    owner_id: i64,
) -> Result<Vec<(i64, PlayerRecord)>, PersistenceError> {
    let rows = sqlx::query("SELECT * FROM players_basic WHERE user_id = ? ORDER BY player_id")
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(player_from_row).collect()
}

/// Blocking [`RecordStore`] over a SQLite pool.
///
/// Owns a current-thread Tokio runtime that drives every query to
/// completion, so it must not be used from inside another runtime.
pub struct SqliteStore {
    runtime: tokio::runtime::Runtime,
    pool: SqlitePool,
    identities: IdentityReturn,
}

impl SqliteStore {
    /// Connect to `url`, creating the file and schema when missing.
    pub fn connect(url: &str, identities: IdentityReturn) -> Result<Self, PersistenceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let pool = runtime.block_on(init_db(url))?;
        Ok(Self {
            runtime,
            pool,
            identities,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a future on the store's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn seed_names(&self, names: &NamePool) -> Result<u64, PersistenceError> {
        self.block_on(seed_name_pool(&self.pool, names))
    }

    pub fn players_of(&self, owner_id: i64) -> Result<Vec<(i64, PlayerRecord)>, PersistenceError> {
        self.block_on(load_players(&self.pool, owner_id))
    }

    pub fn close(self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl RecordStore for SqliteStore {
    fn insert_one(&mut self, record: &PlayerRecord) -> Result<i64, PersistenceError> {
        self.runtime.block_on(insert_player(&self.pool, record))
    }

    fn insert_many(&mut self, records: &[PlayerRecord]) -> Result<InsertOutcome, PersistenceError> {
        self.runtime
            .block_on(insert_players(&self.pool, records, self.identities))
    }
}

impl NamePoolProvider for SqliteStore {
    fn load(&self) -> Result<NamePool, ConfigError> {
        let (first, last) = self
            .block_on(load_name_texts(&self.pool))
            .map_err(|e| ConfigError::Unavailable(e.to_string()))?;
        NamePool::new(first, last)
    }
}
