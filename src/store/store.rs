// src/store/store.rs — SQLite operations for arguments and evaluations
//
// Each insert is a single `INSERT OR IGNORE` statement, so a record is either
// fully written or absent, and a second insert for the same pair (or the same
// argument + rubric version) is a no-op that reports `None`.

use std::collections::{BTreeMap, HashSet};

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::pairs::PairKey;
use crate::usage::UsageTokens;

/// Evaluations written before rubric versioning count as version 1.
const LEGACY_VERSION_SQL: &str = "COALESCE(evaluator_version, 1)";

/// Low-level SQLite operations for both record kinds.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Arguments --

    /// Persist a generated argument. Returns `None` when the pair already has one.
    pub fn insert_pair_argument(&self, new: &NewArgument<'_>) -> anyhow::Result<Option<i64>> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO pair_arguments
             (psalm_x, psalm_y, prompt, response_text, response_json, model, created_at,
              total_tokens, reasoning_tokens, non_reasoning_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.pair.source(),
                new.pair.target(),
                new.prompt,
                new.response_text,
                new.response_json,
                new.model,
                now(),
                new.usage.total,
                new.usage.reasoning,
                new.usage.non_reasoning,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    pub fn existing_pairs(&self) -> anyhow::Result<HashSet<PairKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT psalm_x, psalm_y FROM pair_arguments")?;
        let rows = stmt.query_map([], |row| {
            let x: i64 = row.get(0)?;
            let y: i64 = row.get(1)?;
            PairKey::new(x, y).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e))
            })
        })?;

        let mut result = HashSet::new();
        for row in rows {
            result.insert(row?);
        }
        Ok(result)
    }

    pub fn argument_for_pair(&self, pair: PairKey) -> anyhow::Result<Option<ArgumentRow>> {
        let row = self
            .conn
            .query_row(
                &format!("{ARGUMENT_SELECT} WHERE psalm_x = ?1 AND psalm_y = ?2"),
                params![pair.source(), pair.target()],
                argument_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All arguments in creation order.
    pub fn all_arguments(&self) -> anyhow::Result<Vec<ArgumentRow>> {
        self.query_arguments(&format!("{ARGUMENT_SELECT} ORDER BY id ASC"), [])
    }

    /// Most recent arguments first.
    pub fn recent_arguments(&self, limit: usize) -> anyhow::Result<Vec<ArgumentRow>> {
        self.query_arguments(
            &format!("{ARGUMENT_SELECT} ORDER BY id DESC LIMIT ?1"),
            params![limit as i64],
        )
    }

    /// Arguments in creation order with no evaluation at `version`.
    pub fn pending_evaluations(
        &self,
        limit: usize,
        version: u32,
    ) -> anyhow::Result<Vec<ArgumentRow>> {
        self.query_arguments(
            &format!(
                "{ARGUMENT_SELECT} WHERE NOT EXISTS (
                     SELECT 1 FROM pair_evaluations pe
                     WHERE pe.pair_id = pair_arguments.id
                       AND COALESCE(pe.evaluator_version, 1) = ?1
                 )
                 ORDER BY id ASC
                 LIMIT ?2"
            ),
            params![version, limit as i64],
        )
    }

    fn query_arguments<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> anyhow::Result<Vec<ArgumentRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, argument_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Evaluations --

    /// Persist an evaluation. Returns `None` when one already exists for
    /// this argument at this rubric version.
    pub fn insert_evaluation(&self, new: &NewEvaluation<'_>) -> anyhow::Result<Option<i64>> {
        let tx = self.conn.unchecked_transaction()?;

        let exists: bool = tx.query_row(
            &format!(
                "SELECT COUNT(*) > 0 FROM pair_evaluations
                 WHERE pair_id = ?1 AND {LEGACY_VERSION_SQL} = ?2"
            ),
            params![new.argument_id, new.evaluator_version],
            |r| r.get(0),
        )?;
        if exists {
            return Ok(None);
        }

        let changed = tx.execute(
            "INSERT OR IGNORE INTO pair_evaluations
             (pair_id, score, justification, evaluator_model, evaluation_json, created_at,
              evaluator_version, checks_json, flags_json, vocabulary_specificity,
              total_tokens, reasoning_tokens, non_reasoning_tokens, key_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                new.argument_id,
                new.score,
                new.justification,
                new.evaluator_model,
                new.evaluation_json,
                now(),
                new.evaluator_version,
                new.checks_json,
                new.flags_json,
                new.vocabulary_specificity,
                new.usage.total,
                new.usage.reasoning,
                new.usage.non_reasoning,
                new.key_order,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
    }

    /// Every evaluation, grouped by argument then version.
    pub fn all_evaluations(&self) -> anyhow::Result<Vec<EvaluationRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT} ORDER BY pair_id ASC, {LEGACY_VERSION_SQL} ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], evaluation_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn evaluations_for_argument(&self, argument_id: i64) -> anyhow::Result<Vec<EvaluationRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT} WHERE pair_id = ?1 ORDER BY {LEGACY_VERSION_SQL} ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![argument_id], evaluation_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Manual maintenance: drop every evaluation of one pair.
    pub fn delete_evaluations_for_pair(&self, pair: PairKey) -> anyhow::Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM pair_evaluations WHERE pair_id IN (
                 SELECT id FROM pair_arguments WHERE psalm_x = ?1 AND psalm_y = ?2
             )",
            params![pair.source(), pair.target()],
        )?;
        Ok(n)
    }

    /// Scores grouped by rubric version.
    pub fn scores_by_version(&self) -> anyhow::Result<BTreeMap<u32, Vec<f64>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEGACY_VERSION_SQL}, score FROM pair_evaluations ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, f64>(1)?)))?;

        let mut result: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for row in rows {
            let (version, score) = row?;
            result.entry(version).or_default().push(score);
        }
        Ok(result)
    }

    // -- Progress --

    pub fn counts(&self) -> anyhow::Result<Counts> {
        let generated: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pair_arguments", [], |r| r.get(0))?;
        let evaluated: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT pair_id) FROM pair_evaluations",
            [],
            |r| r.get(0),
        )?;
        Ok(Counts {
            generated: generated as usize,
            evaluated: evaluated as usize,
            total_pairs: crate::pairs::TOTAL_PAIRS,
        })
    }

    /// Per-day counts of new arguments and first-time evaluated pairs, oldest first.
    pub fn daily_progress(&self) -> anyhow::Result<Vec<DailyProgressRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, SUM(generated), SUM(evaluated) FROM (
                 SELECT substr(created_at, 1, 10) AS day, 1 AS generated, 0 AS evaluated
                 FROM pair_arguments
                 UNION ALL
                 SELECT substr(MIN(created_at), 1, 10) AS day, 0, 1
                 FROM pair_evaluations GROUP BY pair_id
             )
             GROUP BY day
             ORDER BY day ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DailyProgressRow {
                day: row.get(0)?,
                generated_count: row.get::<_, i64>(1)? as usize,
                evaluated_count: row.get::<_, i64>(2)? as usize,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

const ARGUMENT_SELECT: &str = "SELECT id, psalm_x, psalm_y, prompt, response_text, response_json,
     model, created_at, total_tokens, reasoning_tokens, non_reasoning_tokens
     FROM pair_arguments";

fn argument_from_row(row: &Row<'_>) -> rusqlite::Result<ArgumentRow> {
    let x: i64 = row.get(1)?;
    let y: i64 = row.get(2)?;
    let pair = PairKey::new(x, y)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e)))?;
    Ok(ArgumentRow {
        id: row.get(0)?,
        pair,
        prompt: row.get(3)?,
        response_text: row.get(4)?,
        response_json: row.get(5)?,
        model: row.get(6)?,
        created_at: row.get(7)?,
        usage: UsageTokens {
            total: row.get(8)?,
            reasoning: row.get(9)?,
            non_reasoning: row.get(10)?,
        },
    })
}

const EVALUATION_SELECT: &str = "SELECT id, pair_id, COALESCE(evaluator_version, 1), score,
     justification, evaluator_model, evaluation_json, checks_json, flags_json,
     vocabulary_specificity, key_order, created_at,
     total_tokens, reasoning_tokens, non_reasoning_tokens
     FROM pair_evaluations";

fn evaluation_from_row(row: &Row<'_>) -> rusqlite::Result<EvaluationRow> {
    Ok(EvaluationRow {
        id: row.get(0)?,
        argument_id: row.get(1)?,
        evaluator_version: row.get(2)?,
        score: row.get(3)?,
        justification: row.get(4)?,
        evaluator_model: row.get(5)?,
        evaluation_json: row.get(6)?,
        checks_json: row.get(7)?,
        flags_json: row.get(8)?,
        vocabulary_specificity: row.get(9)?,
        key_order: row.get(10)?,
        created_at: row.get(11)?,
        usage: UsageTokens {
            total: row.get(12)?,
            reasoning: row.get(13)?,
            non_reasoning: row.get(14)?,
        },
    })
}

// -- Insert types --

#[derive(Debug, Clone)]
pub struct NewArgument<'a> {
    pub pair: PairKey,
    pub prompt: &'a str,
    pub response_text: &'a str,
    /// Full serialized response.
    pub response_json: &'a str,
    pub model: &'a str,
    pub usage: UsageTokens,
}

#[derive(Debug, Clone)]
pub struct NewEvaluation<'a> {
    pub argument_id: i64,
    pub evaluator_version: u32,
    pub evaluator_model: &'a str,
    pub score: f64,
    pub justification: &'a str,
    /// Nested `{name: bool}` object.
    pub checks_json: &'a str,
    pub flags_json: &'a str,
    pub vocabulary_specificity: f64,
    /// Top-level keys as emitted, comma-joined.
    pub key_order: &'a str,
    /// Full serialized response.
    pub evaluation_json: &'a str,
    pub usage: UsageTokens,
}

// -- Row types --

#[derive(Debug, Clone)]
pub struct ArgumentRow {
    pub id: i64,
    pub pair: PairKey,
    pub prompt: String,
    pub response_text: String,
    pub response_json: String,
    pub model: String,
    pub created_at: String,
    pub usage: UsageTokens,
}

#[derive(Debug, Clone)]
pub struct EvaluationRow {
    pub id: i64,
    pub argument_id: i64,
    pub evaluator_version: u32,
    pub score: f64,
    pub justification: String,
    pub evaluator_model: String,
    pub evaluation_json: String,
    pub checks_json: Option<String>,
    pub flags_json: Option<String>,
    pub vocabulary_specificity: Option<f64>,
    pub key_order: Option<String>,
    pub created_at: String,
    pub usage: UsageTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub generated: usize,
    pub evaluated: usize,
    pub total_pairs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyProgressRow {
    pub day: String,
    pub generated_count: usize,
    pub evaluated_count: usize,
}
