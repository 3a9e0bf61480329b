// src/usage/mod.rs — Token usage extraction and aggregation
//
// Usage objects differ between API generations (Responses vs Chat Completions)
// and older rows may lack the persisted usage columns entirely. Extraction walks
// a fallback chain and anything that cannot be determined stays `None`, which
// is rendered as "unknown" rather than counted as zero.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::store::store::{ArgumentRow, EvaluationRow, Store};

/// Token counts for a single generation or evaluation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTokens {
    pub total: Option<i64>,
    pub reasoning: Option<i64>,
    pub non_reasoning: Option<i64>,
}

impl UsageTokens {
    pub fn is_unknown(&self) -> bool {
        self.total.is_none() && self.reasoning.is_none() && self.non_reasoning.is_none()
    }
}

/// Extract usage from a raw response (or a bare usage object).
pub fn extract_usage(response: &Value) -> UsageTokens {
    let usage = match response.get("usage") {
        Some(u) if u.is_object() => u,
        _ => response,
    };

    let input = field(usage, "input_tokens").or_else(|| field(usage, "prompt_tokens"));
    let output = field(usage, "output_tokens");
    let completion = field(usage, "completion_tokens");

    let total = field(usage, "total_tokens")
        .or_else(|| match (input, output.or(completion)) {
            (Some(i), Some(o)) => Some(i + o),
            _ => None,
        })
        .or(completion);

    let reasoning = nested(usage, "output_tokens_details", "reasoning_tokens")
        .or_else(|| nested(usage, "completion_tokens_details", "reasoning_tokens"));

    let non_reasoning = field(usage, "non_reasoning_tokens").or_else(|| {
        let generated = output.or(completion)?;
        let reasoning = reasoning?;
        Some((generated - reasoning).max(0))
    });

    UsageTokens {
        total,
        reasoning,
        non_reasoning,
    }
}

/// Persisted columns win; rows that predate them are re-derived from the raw JSON.
pub fn resolve_usage(stored: UsageTokens, raw_json: &str) -> UsageTokens {
    if !stored.is_unknown() {
        return stored;
    }
    match serde_json::from_str::<Value>(raw_json) {
        Ok(value) => extract_usage(&value),
        Err(_) => stored,
    }
}

fn field(obj: &Value, key: &str) -> Option<i64> {
    as_count(obj.get(key)?)
}

fn nested(obj: &Value, outer: &str, inner: &str) -> Option<i64> {
    as_count(obj.get(outer)?.get(inner)?)
}

fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn add_opt(acc: Option<i64>, value: Option<i64>) -> Option<i64> {
    match (acc, value) {
        (Some(a), Some(b)) => Some(a + b),
        (None, v) => v,
        (a, None) => a,
    }
}

/// Summed usage over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenTotals {
    pub total: Option<i64>,
    pub reasoning: Option<i64>,
    pub non_reasoning: Option<i64>,
    pub records: usize,
    /// Records whose total could not be determined.
    pub unknown: usize,
}

impl TokenTotals {
    pub fn add(&mut self, usage: &UsageTokens) {
        self.total = add_opt(self.total, usage.total);
        self.reasoning = add_opt(self.reasoning, usage.reasoning);
        self.non_reasoning = add_opt(self.non_reasoning, usage.non_reasoning);
        self.records += 1;
        if usage.total.is_none() {
            self.unknown += 1;
        }
    }

    pub fn merge(&self, other: &TokenTotals) -> TokenTotals {
        TokenTotals {
            total: add_opt(self.total, other.total),
            reasoning: add_opt(self.reasoning, other.reasoning),
            non_reasoning: add_opt(self.non_reasoning, other.non_reasoning),
            records: self.records + other.records,
            unknown: self.unknown + other.unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub day: String,
    pub generation: TokenTotals,
    pub evaluation: TokenTotals,
    pub overall: TokenTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub overall: TokenTotals,
    pub generation: TokenTotals,
    pub evaluation: TokenTotals,
    /// Oldest day first.
    pub daily: Vec<DailyUsage>,
}

/// Aggregate usage over every stored argument and evaluation.
pub fn aggregate(store: &Store) -> anyhow::Result<UsageSummary> {
    let arguments = store.all_arguments()?;
    let evaluations = store.all_evaluations()?;
    Ok(summarize(&arguments, &evaluations))
}

pub fn summarize(arguments: &[ArgumentRow], evaluations: &[EvaluationRow]) -> UsageSummary {
    let mut generation = TokenTotals::default();
    let mut evaluation = TokenTotals::default();
    let mut days: BTreeMap<String, (TokenTotals, TokenTotals)> = BTreeMap::new();

    for row in arguments {
        let usage = resolve_usage(row.usage, &row.response_json);
        generation.add(&usage);
        days.entry(day_of(&row.created_at)).or_default().0.add(&usage);
    }
    for row in evaluations {
        let usage = resolve_usage(row.usage, &row.evaluation_json);
        evaluation.add(&usage);
        days.entry(day_of(&row.created_at)).or_default().1.add(&usage);
    }

    let daily = days
        .into_iter()
        .map(|(day, (gen, eval))| DailyUsage {
            day,
            overall: gen.merge(&eval),
            generation: gen,
            evaluation: eval,
        })
        .collect();

    UsageSummary {
        overall: generation.merge(&evaluation),
        generation,
        evaluation,
        daily,
    }
}

/// `YYYY-MM-DD` prefix of an ISO timestamp.
pub fn day_of(timestamp: &str) -> String {
    timestamp.chars().take(10).collect()
}
