use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Pooled connection to the Memory Store's SQLite backend; owns schema
/// migration on startup (spec.md §6).
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!(db_url, "connected to memory store");

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Creates the three logical tables (decisions, outcomes, patterns) and
    /// their indexes if absent. Idempotent.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                confidence REAL NOT NULL,
                lots REAL NOT NULL,
                stop_loss REAL,
                take_profit REAL,
                price REAL NOT NULL,
                rsi REAL,
                macd REAL,
                bb_position TEXT,
                regime TEXT,
                signal_agent_output TEXT,
                risk_agent_output TEXT,
                context_agent_output TEXT,
                synthesis_agent_output TEXT,
                vetoed INTEGER NOT NULL DEFAULT 0,
                veto_reason TEXT,
                order_id TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create decisions table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions (timestamp);")
            .execute(&mut *conn)
            .await
            .context("failed to create decisions timestamp index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_symbol ON decisions (symbol);")
            .execute(&mut *conn)
            .await
            .context("failed to create decisions symbol index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outcomes (
                decision_id TEXT PRIMARY KEY REFERENCES decisions(id),
                closed_at TEXT NOT NULL,
                result TEXT NOT NULL,
                pips REAL NOT NULL,
                duration_minutes INTEGER NOT NULL,
                exit_reason TEXT NOT NULL,
                fill_price REAL,
                exit_price REAL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create outcomes table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_outcomes_closed_at ON outcomes (closed_at);")
            .execute(&mut *conn)
            .await
            .context("failed to create outcomes closed_at index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_outcomes_result ON outcomes (result);")
            .execute(&mut *conn)
            .await
            .context("failed to create outcomes result index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patterns (
                pattern_id TEXT PRIMARY KEY,
                rsi_min REAL NOT NULL,
                rsi_max REAL NOT NULL,
                macd_signal TEXT NOT NULL,
                bb_position TEXT,
                regime TEXT,
                win_rate REAL NOT NULL,
                avg_pips REAL NOT NULL,
                sample_size INTEGER NOT NULL,
                last_updated TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create patterns table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_patterns_sample_size ON patterns (sample_size);")
            .execute(&mut *conn)
            .await
            .context("failed to create patterns sample_size index")?;

        info!("memory store schema initialized");
        Ok(())
    }
}
