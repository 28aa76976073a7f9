use anyhow::{anyhow, Context, Result};
use prediction_engine::{PredictionRecord, PredictionSink};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, warn};

const QUEUE_CAPACITY: usize = 1_000;

#[derive(Debug)]
pub enum DbMsg {
    Prediction(PredictionRecord),
}

/// SQLite-backed prediction sink. Rows are handed to a dedicated writer
/// thread; a full queue drops the row with a warning.
pub struct MatchDb {
    tx: mpsc::Sender<DbMsg>,
}

impl MatchDb {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        Self { tx: spawn_db_writer(path.into()) }
    }
}

impl PredictionSink for MatchDb {
    fn record(&self, record: PredictionRecord) -> Result<()> {
        let match_id = record.match_id;
        self.tx.try_send(DbMsg::Prediction(record)).map_err(|e| {
            warn!(match_id, "match db queue rejected row: {e}");
            anyhow!("match db queue: {e}")
        })
    }
}

fn spawn_db_writer(path: PathBuf) -> mpsc::Sender<DbMsg> {
    let (tx, mut rx) = mpsc::channel::<DbMsg>(QUEUE_CAPACITY);

    std::thread::spawn(move || {
        let result: Result<()> = (|| {
            let conn = open(&path)?;
            while let Some(msg) = rx.blocking_recv() {
                if let Err(e) = apply_msg(&conn, msg) {
                    error!("match db write failed: {e:#}");
                }
            }
            Ok(())
        })();

        if let Err(e) = result {
            error!("match db writer stopped: {e:#}");
        }
    });

    tx
}

pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS dotabuff_match (
            id INTEGER PRIMARY KEY,
            dire_heroes TEXT NOT NULL,
            radiant_heroes TEXT NOT NULL,
            radiant_won INTEGER NOT NULL,
            predicted_radiant_won INTEGER NOT NULL,
            tournament_link TEXT NOT NULL,
            dire_team_link TEXT NOT NULL,
            radiant_team_link TEXT NOT NULL,
            radiant_score REAL NOT NULL,
            dire_score REAL NOT NULL,
            algorithm_version TEXT NOT NULL,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_match_version ON dotabuff_match(algorithm_version);
        "#,
    )
    .context("init sqlite schema")?;
    Ok(())
}

/// Returns how many rows were written; 0 when the match was already stored.
pub fn insert_prediction(conn: &Connection, r: &PredictionRecord) -> Result<usize> {
    let n = conn
        .execute(
            r#"INSERT OR IGNORE INTO dotabuff_match
               (id, dire_heroes, radiant_heroes, radiant_won, predicted_radiant_won,
                tournament_link, dire_team_link, radiant_team_link,
                radiant_score, dire_score, algorithm_version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                r.match_id,
                r.dire_heroes,
                r.radiant_heroes,
                r.radiant_won,
                r.predicted_radiant_won,
                r.tournament_link,
                r.dire_team_link,
                r.radiant_team_link,
                r.radiant_score,
                r.dire_score,
                r.algorithm_version,
            ],
        )
        .context("insert dotabuff_match")?;
    Ok(n)
}

fn apply_msg(conn: &Connection, msg: DbMsg) -> Result<()> {
    match msg {
        DbMsg::Prediction(r) => {
            if insert_prediction(conn, &r)? == 0 {
                tracing::debug!(match_id = r.match_id, "match already recorded");
            }
        }
    }
    Ok(())
}
