//! Memory Store (spec.md §4.3): persists decisions/outcomes/patterns and
//! builds read-only MemorySnapshots on demand.

use crate::domain::errors::StorageError;
use crate::domain::memory::{MemorySnapshot, Pattern, StoredDecision, TradeOutcome};
use crate::domain::types::{Action, MarketRegimeType, TradeResult};
use crate::infrastructure::persistence::database::Database;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::Row;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn save_decision(&self, decision: &StoredDecision) -> Result<(), StorageError>;
    /// Records the broker order id a decision was filled under, once
    /// submission succeeds — the link `open_order_ids` needs to reconcile
    /// against the adapter's order book after a restart.
    async fn record_order_id(&self, decision_id: &str, order_id: &str) -> Result<(), StorageError>;
    async fn save_outcome(&self, outcome: &TradeOutcome) -> Result<(), StorageError>;
    async fn load_snapshot(
        &self,
        days: i64,
        symbol: Option<&str>,
    ) -> Result<MemorySnapshot, StorageError>;
    async fn find_similar_patterns(
        &self,
        rsi: Option<f64>,
        macd_sign: &str,
        bb_position: Option<&str>,
        regime: Option<MarketRegimeType>,
        limit: i64,
    ) -> Result<Vec<Pattern>, StorageError>;
    async fn clear_old_data(&self, days: i64) -> Result<u64, StorageError>;
    async fn health_check(&self) -> Result<(), StorageError>;
    /// Aggregates closed decisions joined with their outcomes into the
    /// `patterns` table, bucketed by RSI decile, MACD sign, and regime
    /// (spec.md §4.7: "a pattern-rebuild task aggregates decisions joined
    /// with outcomes into the pattern table"). Returns the number of
    /// pattern rows upserted.
    async fn rebuild_patterns(&self) -> Result<u64, StorageError>;
    /// Joins un-vetoed decisions with their closed outcomes, newest first,
    /// the training set the Calibrator refits from (spec.md §4.5).
    async fn recent_calibration_pairs(&self, limit: i64) -> Result<Vec<(f64, TradeOutcome)>, StorageError>;
    /// (decision_id, order_id) pairs for un-vetoed, actionable decisions
    /// that were filled but have no recorded outcome yet — the set a
    /// restart must reconcile against the adapter's live order book before
    /// resuming normal operation.
    async fn open_order_ids(&self) -> Result<Vec<(String, String)>, StorageError>;
}

pub struct SqliteMemoryStore {
    db: Database,
}

impl SqliteMemoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn action_to_str(action: Action) -> &'static str {
    match action {
        Action::Buy => "BUY",
        Action::Sell => "SELL",
        Action::Hold => "HOLD",
    }
}

fn str_to_action(s: &str) -> Action {
    match s {
        "BUY" => Action::Buy,
        "SELL" => Action::Sell,
        _ => Action::Hold,
    }
}

fn regime_to_str(regime: MarketRegimeType) -> &'static str {
    match regime {
        MarketRegimeType::TrendingUp => "TRENDING_UP",
        MarketRegimeType::TrendingDown => "TRENDING_DOWN",
        MarketRegimeType::Ranging => "RANGING",
        MarketRegimeType::Volatile => "VOLATILE",
        MarketRegimeType::Unknown => "UNKNOWN",
    }
}

fn str_to_regime(s: &str) -> Option<MarketRegimeType> {
    match s {
        "TRENDING_UP" => Some(MarketRegimeType::TrendingUp),
        "TRENDING_DOWN" => Some(MarketRegimeType::TrendingDown),
        "RANGING" => Some(MarketRegimeType::Ranging),
        "VOLATILE" => Some(MarketRegimeType::Volatile),
        "UNKNOWN" => Some(MarketRegimeType::Unknown),
        _ => None,
    }
}

fn result_to_str(result: TradeResult) -> &'static str {
    match result {
        TradeResult::Win => "WIN",
        TradeResult::Loss => "LOSS",
        TradeResult::Breakeven => "BREAKEVEN",
    }
}

fn str_to_result(s: &str) -> TradeResult {
    match s {
        "WIN" => TradeResult::Win,
        "LOSS" => TradeResult::Loss,
        _ => TradeResult::Breakeven,
    }
}

fn str_to_exit_reason(s: &str) -> crate::domain::types::ExitReason {
    use crate::domain::types::ExitReason;
    match s {
        "StopLoss" => ExitReason::StopLoss,
        "TakeProfit" => ExitReason::TakeProfit,
        "Timeout" => ExitReason::Timeout,
        _ => ExitReason::Manual,
    }
}

fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.map(dec_to_f64)
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn save_decision(&self, decision: &StoredDecision) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO decisions (
                id, timestamp, symbol, action, confidence, lots, stop_loss, take_profit,
                price, rsi, macd, bb_position, regime,
                signal_agent_output, risk_agent_output, context_agent_output, synthesis_agent_output,
                vetoed, veto_reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                timestamp = excluded.timestamp,
                symbol = excluded.symbol,
                action = excluded.action,
                confidence = excluded.confidence,
                lots = excluded.lots,
                stop_loss = excluded.stop_loss,
                take_profit = excluded.take_profit,
                price = excluded.price,
                rsi = excluded.rsi,
                macd = excluded.macd,
                bb_position = excluded.bb_position,
                regime = excluded.regime,
                signal_agent_output = excluded.signal_agent_output,
                risk_agent_output = excluded.risk_agent_output,
                context_agent_output = excluded.context_agent_output,
                synthesis_agent_output = excluded.synthesis_agent_output,
                vetoed = excluded.vetoed,
                veto_reason = excluded.veto_reason
            "#,
        )
        .bind(&decision.id)
        .bind(decision.timestamp_utc.to_rfc3339())
        .bind(&decision.symbol)
        .bind(action_to_str(decision.action))
        .bind(decision.confidence)
        .bind(dec_to_f64(decision.lots))
        .bind(opt_dec_to_f64(decision.stop_loss))
        .bind(opt_dec_to_f64(decision.take_profit))
        .bind(dec_to_f64(decision.price))
        .bind(decision.rsi)
        .bind(decision.macd)
        .bind(&decision.bb_position)
        .bind(decision.regime.map(regime_to_str))
        .bind(decision.signal_agent_output.as_ref().map(|v| v.to_string()))
        .bind(decision.risk_agent_output.as_ref().map(|v| v.to_string()))
        .bind(decision.context_agent_output.as_ref().map(|v| v.to_string()))
        .bind(decision.synthesis_agent_output.as_ref().map(|v| v.to_string()))
        .bind(decision.vetoed)
        .bind(&decision.veto_reason)
        .execute(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "save_decision".to_string(),
            source: e.into(),
        })?;

        Ok(())
    }

    async fn record_order_id(&self, decision_id: &str, order_id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE decisions SET order_id = ? WHERE id = ?")
            .bind(order_id)
            .bind(decision_id)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "record_order_id".to_string(),
                source: e.into(),
            })?;

        Ok(())
    }

    async fn save_outcome(&self, outcome: &TradeOutcome) -> Result<(), StorageError> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM decisions WHERE id = ?")
            .bind(&outcome.decision_id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "save_outcome:lookup_decision".to_string(),
                source: e.into(),
            })?;

        if exists.is_none() {
            return Err(StorageError::UnknownDecision {
                decision_id: outcome.decision_id.clone(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO outcomes (
                decision_id, closed_at, result, pips, duration_minutes, exit_reason, fill_price, exit_price
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(decision_id) DO UPDATE SET
                closed_at = excluded.closed_at,
                result = excluded.result,
                pips = excluded.pips,
                duration_minutes = excluded.duration_minutes,
                exit_reason = excluded.exit_reason,
                fill_price = excluded.fill_price,
                exit_price = excluded.exit_price
            "#,
        )
        .bind(&outcome.decision_id)
        .bind(outcome.closed_at_utc.to_rfc3339())
        .bind(result_to_str(outcome.result))
        .bind(outcome.pips)
        .bind(outcome.duration_minutes)
        .bind(format!("{:?}", outcome.exit_reason))
        .bind(opt_dec_to_f64(outcome.fill_price))
        .bind(opt_dec_to_f64(outcome.exit_price))
        .execute(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "save_outcome".to_string(),
            source: e.into(),
        })?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        days: i64,
        symbol: Option<&str>,
    ) -> Result<MemorySnapshot, StorageError> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();

        let recent_rows = if let Some(sym) = symbol {
            sqlx::query(
                "SELECT id, timestamp, symbol, action, confidence, lots, stop_loss, take_profit, price, rsi, macd, bb_position, regime, vetoed, veto_reason \
                 FROM decisions WHERE symbol = ? ORDER BY timestamp DESC LIMIT 10",
            )
            .bind(sym)
            .fetch_all(&self.db.pool)
            .await
        } else {
            sqlx::query(
                "SELECT id, timestamp, symbol, action, confidence, lots, stop_loss, take_profit, price, rsi, macd, bb_position, regime, vetoed, veto_reason \
                 FROM decisions ORDER BY timestamp DESC LIMIT 10",
            )
            .fetch_all(&self.db.pool)
            .await
        }
        .map_err(|e| StorageError::Backend {
            operation: "load_snapshot:recent_decisions".to_string(),
            source: e.into(),
        })?;

        let recent_decisions: Vec<StoredDecision> = recent_rows
            .iter()
            .map(|row| StoredDecision {
                id: row.get("id"),
                timestamp_utc: DateTime::parse_from_rfc3339(row.get::<String, _>("timestamp").as_str())
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                symbol: row.get("symbol"),
                action: str_to_action(row.get::<String, _>("action").as_str()),
                confidence: row.get("confidence"),
                lots: Decimal::from_f64_retain(row.get("lots")).unwrap_or_default(),
                stop_loss: row
                    .get::<Option<f64>, _>("stop_loss")
                    .and_then(Decimal::from_f64_retain),
                take_profit: row
                    .get::<Option<f64>, _>("take_profit")
                    .and_then(Decimal::from_f64_retain),
                price: Decimal::from_f64_retain(row.get("price")).unwrap_or_default(),
                rsi: row.get("rsi"),
                macd: row.get("macd"),
                bb_position: row.get("bb_position"),
                regime: row
                    .get::<Option<String>, _>("regime")
                    .and_then(|s| str_to_regime(&s)),
                signal_agent_output: None,
                risk_agent_output: None,
                context_agent_output: None,
                synthesis_agent_output: None,
                vetoed: row.get("vetoed"),
                veto_reason: row.get("veto_reason"),
            })
            .collect();

        let current_regime = recent_decisions.first().and_then(|d| d.regime);

        let win_row = sqlx::query(
            "SELECT \
                COUNT(*) as total, \
                SUM(CASE WHEN result = 'WIN' THEN 1 ELSE 0 END) as wins, \
                AVG(CASE WHEN result = 'WIN' THEN pips END) as avg_win, \
                AVG(CASE WHEN result = 'LOSS' THEN pips END) as avg_loss \
             FROM outcomes WHERE closed_at >= ?",
        )
        .bind(&cutoff)
        .fetch_one(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "load_snapshot:aggregates".to_string(),
            source: e.into(),
        })?;

        let total_trades_30d: i64 = win_row.get("total");
        let wins: i64 = win_row.get::<Option<i64>, _>("wins").unwrap_or(0);
        let win_rate_30d = if total_trades_30d > 0 {
            wins as f64 / total_trades_30d as f64
        } else {
            0.0
        };
        let avg_win_pips: f64 = win_row.get::<Option<f64>, _>("avg_win").unwrap_or(0.0);
        let avg_loss_pips: f64 = win_row.get::<Option<f64>, _>("avg_loss").unwrap_or(0.0);

        let similar_patterns = if let Some(regime) = current_regime {
            self.find_similar_patterns(None, "ANY", None, Some(regime), 5).await?
        } else {
            Vec::new()
        };

        Ok(MemorySnapshot {
            recent_decisions,
            current_regime,
            win_rate_30d,
            avg_win_pips,
            avg_loss_pips,
            total_trades_30d,
            similar_patterns,
        })
    }

    async fn find_similar_patterns(
        &self,
        rsi: Option<f64>,
        macd_sign: &str,
        bb_position: Option<&str>,
        regime: Option<MarketRegimeType>,
        limit: i64,
    ) -> Result<Vec<Pattern>, StorageError> {
        let rows = sqlx::query(
            "SELECT pattern_id, rsi_min, rsi_max, macd_signal, bb_position, regime, win_rate, avg_pips, sample_size, last_updated \
             FROM patterns WHERE sample_size >= 10 ORDER BY sample_size DESC",
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "find_similar_patterns".to_string(),
            source: e.into(),
        })?;

        let regime_str = regime.map(regime_to_str);

        let mut matches: Vec<Pattern> = rows
            .iter()
            .filter(|row| {
                let rsi_min: f64 = row.get("rsi_min");
                let rsi_max: f64 = row.get("rsi_max");
                if let Some(r) = rsi
                    && !(rsi_min..=rsi_max).contains(&r)
                {
                    return false;
                }
                let row_macd_signal: String = row.get("macd_signal");
                if macd_sign != "ANY" && row_macd_signal != macd_sign {
                    return false;
                }
                let row_bb: Option<String> = row.get("bb_position");
                if let (Some(want), Some(have)) = (bb_position, row_bb.as_deref())
                    && want != have
                {
                    return false;
                }
                let row_regime: Option<String> = row.get("regime");
                if let (Some(want), Some(have)) = (regime_str, row_regime.as_deref())
                    && want != have
                {
                    return false;
                }
                true
            })
            .map(|row| Pattern {
                pattern_id: row.get("pattern_id"),
                rsi_min: row.get("rsi_min"),
                rsi_max: row.get("rsi_max"),
                macd_signal: row.get("macd_signal"),
                bb_position: row.get("bb_position"),
                regime: row
                    .get::<Option<String>, _>("regime")
                    .and_then(|s| str_to_regime(&s)),
                win_rate: row.get("win_rate"),
                avg_pips: row.get("avg_pips"),
                sample_size: row.get("sample_size"),
                last_updated: DateTime::parse_from_rfc3339(
                    row.get::<String, _>("last_updated").as_str(),
                )
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        matches.truncate(limit.max(0) as usize);
        Ok(matches)
    }

    async fn clear_old_data(&self, days: i64) -> Result<u64, StorageError> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();

        let outcomes_deleted = sqlx::query("DELETE FROM outcomes WHERE closed_at < ?")
            .bind(&cutoff)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "clear_old_data:outcomes".to_string(),
                source: e.into(),
            })?
            .rows_affected();

        let decisions_deleted = sqlx::query("DELETE FROM decisions WHERE timestamp < ?")
            .bind(&cutoff)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "clear_old_data:decisions".to_string(),
                source: e.into(),
            })?
            .rows_affected();

        let patterns_deleted = sqlx::query("DELETE FROM patterns WHERE last_updated < ?")
            .bind(&cutoff)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "clear_old_data:patterns".to_string(),
                source: e.into(),
            })?
            .rows_affected();

        Ok(outcomes_deleted + decisions_deleted + patterns_deleted)
    }

    async fn rebuild_patterns(&self) -> Result<u64, StorageError> {
        let rows = sqlx::query(
            "SELECT \
                CAST(d.rsi / 10 AS INTEGER) * 10 AS rsi_min, \
                CASE WHEN d.macd > 0 THEN 'POS' WHEN d.macd < 0 THEN 'NEG' ELSE 'ZERO' END AS macd_signal, \
                d.bb_position AS bb_position, \
                d.regime AS regime, \
                AVG(CASE WHEN o.result = 'WIN' THEN 1.0 ELSE 0.0 END) AS win_rate, \
                AVG(o.pips) AS avg_pips, \
                COUNT(*) AS sample_size \
             FROM decisions d \
             JOIN outcomes o ON d.id = o.decision_id \
             WHERE d.rsi IS NOT NULL \
             GROUP BY rsi_min, macd_signal, bb_position, regime",
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "rebuild_patterns:aggregate".to_string(),
            source: e.into(),
        })?;

        let now = Utc::now().to_rfc3339();
        let mut upserted = 0u64;

        for row in &rows {
            let rsi_min: i64 = row.get("rsi_min");
            let rsi_max = rsi_min + 10;
            let macd_signal: String = row.get("macd_signal");
            let bb_position: Option<String> = row.get("bb_position");
            let regime: Option<String> = row.get("regime");
            let win_rate: f64 = row.get("win_rate");
            let avg_pips: f64 = row.get("avg_pips");
            let sample_size: i64 = row.get("sample_size");

            let pattern_id = format!(
                "{rsi_min}-{macd_signal}-{}-{}",
                bb_position.as_deref().unwrap_or("ANY"),
                regime.as_deref().unwrap_or("ANY")
            );

            sqlx::query(
                r#"
                INSERT INTO patterns (
                    pattern_id, rsi_min, rsi_max, macd_signal, bb_position, regime,
                    win_rate, avg_pips, sample_size, last_updated
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(pattern_id) DO UPDATE SET
                    rsi_min = excluded.rsi_min,
                    rsi_max = excluded.rsi_max,
                    macd_signal = excluded.macd_signal,
                    bb_position = excluded.bb_position,
                    regime = excluded.regime,
                    win_rate = excluded.win_rate,
                    avg_pips = excluded.avg_pips,
                    sample_size = excluded.sample_size,
                    last_updated = excluded.last_updated
                "#,
            )
            .bind(&pattern_id)
            .bind(rsi_min as f64)
            .bind(rsi_max as f64)
            .bind(&macd_signal)
            .bind(&bb_position)
            .bind(&regime)
            .bind(win_rate)
            .bind(avg_pips)
            .bind(sample_size)
            .bind(&now)
            .execute(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "rebuild_patterns:upsert".to_string(),
                source: e.into(),
            })?;

            upserted += 1;
        }

        Ok(upserted)
    }

    async fn recent_calibration_pairs(&self, limit: i64) -> Result<Vec<(f64, TradeOutcome)>, StorageError> {
        let rows = sqlx::query(
            "SELECT d.confidence AS confidence, \
                    o.decision_id AS decision_id, o.closed_at AS closed_at, o.result AS result, \
                    o.pips AS pips, o.duration_minutes AS duration_minutes, o.exit_reason AS exit_reason, \
                    o.fill_price AS fill_price, o.exit_price AS exit_price \
             FROM decisions d \
             JOIN outcomes o ON d.id = o.decision_id \
             WHERE d.vetoed = 0 \
             ORDER BY o.closed_at DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "recent_calibration_pairs".to_string(),
            source: e.into(),
        })?;

        Ok(rows
            .iter()
            .map(|row| {
                let confidence: f64 = row.get("confidence");
                let outcome = TradeOutcome {
                    decision_id: row.get("decision_id"),
                    closed_at_utc: DateTime::parse_from_rfc3339(row.get::<String, _>("closed_at").as_str())
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    result: str_to_result(row.get::<String, _>("result").as_str()),
                    pips: row.get("pips"),
                    duration_minutes: row.get("duration_minutes"),
                    exit_reason: str_to_exit_reason(row.get::<String, _>("exit_reason").as_str()),
                    fill_price: row
                        .get::<Option<f64>, _>("fill_price")
                        .and_then(Decimal::from_f64_retain),
                    exit_price: row
                        .get::<Option<f64>, _>("exit_price")
                        .and_then(Decimal::from_f64_retain),
                };
                (confidence, outcome)
            })
            .collect())
    }

    async fn open_order_ids(&self) -> Result<Vec<(String, String)>, StorageError> {
        let rows = sqlx::query(
            "SELECT d.id AS id, d.order_id AS order_id FROM decisions d \
             WHERE d.vetoed = 0 AND d.action != 'HOLD' AND d.order_id IS NOT NULL \
             AND NOT EXISTS (SELECT 1 FROM outcomes o WHERE o.decision_id = d.id)",
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| StorageError::Backend {
            operation: "open_order_ids".to_string(),
            source: e.into(),
        })?;

        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("order_id")))
            .collect())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| StorageError::Backend {
                operation: "health_check".to_string(),
                source: e.into(),
            })?;
        Ok(())
    }
}
