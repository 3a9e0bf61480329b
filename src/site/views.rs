// src/site/views.rs — View models for the rendered site
//
// Everything here is pre-formatted text so templates only lay it out.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::pairs::{PairKey, PairSpace};
use crate::store::store::{ArgumentRow, DailyProgressRow, EvaluationRow};
use crate::usage::{resolve_usage, TokenTotals, UsageTokens};

pub const LOW_SCORE_RGB: (u8, u8, u8) = (37, 99, 235);
pub const HIGH_SCORE_RGB: (u8, u8, u8) = (220, 38, 38);
pub const PENDING_COLOR: &str = "#adb5bd";
pub const NOT_GENERATED_COLOR: &str = "#ffffff";

pub const PROJECTION_WINDOW_DAYS: i64 = 14;
pub const RECENT_LIMIT: usize = 50;
const EXCERPT_CHARS: usize = 160;

pub fn fmt_tokens(value: Option<i64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |n| n.to_string())
}

pub fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".into();
    }
    format!("{:.2}", 100.0 * part as f64 / total as f64)
}

/// Drop trailing zeros: 5.0 -> "5", 7.25 -> "7.25".
pub fn fmt_score(score: f64) -> String {
    let text = format!("{:.2}", score);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Linear blue to red by score/10, clamped.
pub fn score_color(score: f64) -> String {
    let ratio = (score / 10.0).clamp(0.0, 1.0);
    let mix = |low: u8, high: u8| -> u8 {
        (low as f64 + (high as f64 - low as f64) * ratio).round() as u8
    };
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(LOW_SCORE_RGB.0, HIGH_SCORE_RGB.0),
        mix(LOW_SCORE_RGB.1, HIGH_SCORE_RGB.1),
        mix(LOW_SCORE_RGB.2, HIGH_SCORE_RGB.2),
    )
}

/// Histogram bucket, rounding half up and clamping to 0..=10.
pub fn score_bucket(score: f64) -> usize {
    ((score + 0.5).floor() as i64).clamp(0, 10) as usize
}

/// Evaluations grouped per argument, latest version first.
pub fn evaluations_by_argument(evaluations: &[EvaluationRow]) -> HashMap<i64, Vec<&EvaluationRow>> {
    let mut grouped: HashMap<i64, Vec<&EvaluationRow>> = HashMap::new();
    for row in evaluations {
        grouped.entry(row.argument_id).or_default().push(row);
    }
    for rows in grouped.values_mut() {
        rows.sort_by(|a, b| {
            b.evaluator_version
                .cmp(&a.evaluator_version)
                .then(b.id.cmp(&a.id))
        });
    }
    grouped
}

// -- Heatmap --

#[derive(Debug, Clone, Serialize)]
pub struct HeatCell {
    pub color: String,
    pub label: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatRow {
    pub number: u16,
    pub cells: Vec<HeatCell>,
}

pub fn heatmap_rows(
    space: PairSpace,
    arguments: &[ArgumentRow],
    evaluations: &HashMap<i64, Vec<&EvaluationRow>>,
) -> Vec<HeatRow> {
    let latest: HashMap<PairKey, Option<f64>> = arguments
        .iter()
        .map(|a| {
            let score = evaluations
                .get(&a.id)
                .and_then(|rows| rows.first())
                .map(|e| e.score);
            (a.pair, score)
        })
        .collect();

    (1..=space.size())
        .map(|x| HeatRow {
            number: x,
            cells: (1..=space.size())
                .map(|y| {
                    let pair = PairKey::new(x as i64, y as i64).ok();
                    let state = pair.and_then(|p| latest.get(&p).map(|s| (p, *s)));
                    match state {
                        None if x == y => HeatCell {
                            color: NOT_GENERATED_COLOR.into(),
                            label: format!("Psalm {x} → {y}: same psalm"),
                            url: None,
                        },
                        None => HeatCell {
                            color: NOT_GENERATED_COLOR.into(),
                            label: format!("Psalm {x} → {y}: Not generated yet"),
                            url: None,
                        },
                        Some((_, None)) => HeatCell {
                            color: PENDING_COLOR.into(),
                            label: format!("Psalm {x} → {y}: Generated, awaiting evaluation"),
                            url: None,
                        },
                        Some((p, Some(score))) => HeatCell {
                            color: score_color(score),
                            label: format!("Psalm {x} → {y}: Evaluation score {:.1}", score),
                            url: Some(format!("pairs/{}", p.file_name())),
                        },
                    }
                })
                .collect(),
        })
        .collect()
}

// -- Diagnostics --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub value: String,
    pub note: String,
}

/// Completion date from the average daily rate over the trailing window.
pub fn projection(
    total: usize,
    completed: usize,
    daily: &[DailyProgressRow],
    count: impl Fn(&DailyProgressRow) -> usize,
    today: NaiveDate,
    window_days: i64,
) -> Projection {
    let dash = || "—".to_string();
    if total == 0 {
        return Projection { value: dash(), note: String::new() };
    }
    if completed >= total {
        return Projection {
            value: "Complete".into(),
            note: format!("All {completed} pairs processed."),
        };
    }
    if daily.is_empty() {
        return Projection { value: dash(), note: "No recorded activity yet.".into() };
    }

    let start = today - Duration::days(window_days - 1);
    let recent: usize = daily
        .iter()
        .filter(|row| {
            NaiveDate::parse_from_str(&row.day, "%Y-%m-%d")
                .map(|d| d >= start && d <= today)
                .unwrap_or(false)
        })
        .map(&count)
        .sum();
    if recent == 0 {
        return Projection {
            value: dash(),
            note: format!("No activity in last {window_days} days."),
        };
    }

    let rate = recent as f64 / window_days as f64;
    let remaining = total - completed;
    let days_needed = (remaining as f64 / rate).ceil() as i64;
    Projection {
        value: (today + Duration::days(days_needed)).format("%Y-%m-%d").to_string(),
        note: format!("Avg {rate:.1}/day over last {window_days} days; {remaining} remaining"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub label: usize,
    pub count: usize,
    /// Bar width as a percentage of the fullest bucket.
    pub width: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub version: u32,
    pub total: usize,
    pub average: String,
    pub buckets: Vec<Bucket>,
}

pub fn histograms(scores_by_version: &BTreeMap<u32, Vec<f64>>) -> Vec<Histogram> {
    scores_by_version
        .iter()
        .map(|(version, scores)| {
            let mut counts = [0usize; 11];
            for score in scores {
                counts[score_bucket(*score)] += 1;
            }
            let max = counts.iter().copied().max().unwrap_or(0).max(1);
            let average = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            Histogram {
                version: *version,
                total: scores.len(),
                average: format!("{average:.2}"),
                buckets: counts
                    .iter()
                    .enumerate()
                    .map(|(label, count)| Bucket {
                        label,
                        count: *count,
                        width: format!("{:.1}", 100.0 * *count as f64 / max as f64),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentRow {
    pub id: i64,
    pub pair: String,
    pub url: Option<String>,
    pub created_at: String,
    pub evaluation: String,
    pub excerpt: String,
}

pub fn recent_rows(
    recent: &[ArgumentRow],
    evaluations: &HashMap<i64, Vec<&EvaluationRow>>,
) -> Vec<RecentRow> {
    recent
        .iter()
        .map(|row| {
            let latest = evaluations.get(&row.id).and_then(|rows| rows.first());
            let excerpt = row
                .response_text
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(EXCERPT_CHARS)
                .collect();
            RecentRow {
                id: row.id,
                pair: format!("{} → {}", row.pair.source(), row.pair.target()),
                url: latest.map(|_| format!("pairs/{}", row.pair.file_name())),
                created_at: row.created_at.clone(),
                evaluation: match latest {
                    Some(e) => format!(
                        "Score {} (v{}) on {}",
                        fmt_score(e.score),
                        e.evaluator_version,
                        e.created_at
                    ),
                    None => "Pending".into(),
                },
                excerpt,
            }
        })
        .collect()
}

// -- Tokens --

#[derive(Debug, Clone, Serialize)]
pub struct TokenCard {
    pub title: &'static str,
    pub total: String,
    pub reasoning: String,
    pub non_reasoning: String,
    pub unknown: usize,
}

impl TokenCard {
    pub fn new(title: &'static str, totals: &TokenTotals) -> Self {
        Self {
            title,
            total: fmt_tokens(totals.total),
            reasoning: fmt_tokens(totals.reasoning),
            non_reasoning: fmt_tokens(totals.non_reasoning),
            unknown: totals.unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyTokenRow {
    pub day: String,
    pub total: String,
    pub reasoning: String,
    pub non_reasoning: String,
    pub generation: String,
    pub evaluation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPart {
    pub label: &'static str,
    pub value: String,
}

/// Per-call token line; empty when nothing was recorded.
pub fn token_parts(usage: &UsageTokens) -> Vec<TokenPart> {
    [
        ("Reasoning", usage.reasoning),
        ("Output", usage.non_reasoning),
        ("Total", usage.total),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value.map(|v| TokenPart {
            label,
            value: v.to_string(),
        })
    })
    .collect()
}

// -- Pair detail --

const CHECK_LABELS: [(&str, &str); 5] = [
    ("has_verse_refs", "Has verse refs"),
    ("any_factual_error_detected", "Factual error detected"),
    ("only_generic_motifs", "Only generic motifs"),
    ("counterargument_considered", "Counterargument considered"),
    ("lxx_mt_numbering_acknowledged", "LXX/MT numbering acknowledged"),
];

#[derive(Debug, Clone, Serialize)]
pub struct CheckLine {
    pub label: &'static str,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub id: i64,
    pub version: u32,
    pub score: String,
    pub model: String,
    pub evaluated_at: String,
    pub tokens: Vec<TokenPart>,
    pub checks: Vec<CheckLine>,
    pub vocabulary: Option<String>,
    pub flags: Vec<String>,
    pub justification: String,
    pub key_order: Option<String>,
}

fn check_lines(checks_json: Option<&str>) -> Vec<CheckLine> {
    let Some(raw) = checks_json else {
        return Vec::new();
    };
    let parsed: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(_) => {
            return vec![CheckLine {
                label: "Unparseable checks",
                status: raw.to_string(),
            }]
        }
    };
    CHECK_LABELS
        .iter()
        .map(|&(key, label)| CheckLine {
            label,
            status: match parsed.get(key) {
                Some(serde_json::Value::Bool(true)) => "Yes".into(),
                Some(serde_json::Value::Bool(false)) => "No".into(),
                Some(other) => other.to_string(),
                None => "—".into(),
            },
        })
        .collect()
}

fn flag_list(flags_json: Option<&str>) -> Vec<String> {
    match flags_json {
        None => Vec::new(),
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .unwrap_or_else(|_| vec![format!("Unparseable flags: {raw}")]),
    }
}

impl EvaluationView {
    pub fn new(row: &EvaluationRow) -> Self {
        Self {
            id: row.id,
            version: row.evaluator_version,
            score: fmt_score(row.score),
            model: row.evaluator_model.clone(),
            evaluated_at: row.created_at.clone(),
            tokens: token_parts(&resolve_usage(row.usage, &row.evaluation_json)),
            checks: check_lines(row.checks_json.as_deref()),
            vocabulary: row.vocabulary_specificity.map(|v| format!("{v:.1}")),
            flags: flag_list(row.flags_json.as_deref()),
            justification: row.justification.clone(),
            key_order: row.key_order.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairView {
    pub x: u16,
    pub y: u16,
    pub argument_id: i64,
    pub generated_at: String,
    pub model: String,
    pub tokens: Vec<TokenPart>,
    pub argument: String,
    pub prompt: String,
    pub latest: EvaluationView,
    pub earlier: Vec<EvaluationView>,
}

impl PairView {
    /// None when the argument has no evaluation yet.
    pub fn new(argument: &ArgumentRow, evaluations: &[&EvaluationRow]) -> Option<Self> {
        let (latest, earlier) = evaluations.split_first()?;
        Some(Self {
            x: argument.pair.source(),
            y: argument.pair.target(),
            argument_id: argument.id,
            generated_at: argument.created_at.clone(),
            model: argument.model.clone(),
            tokens: token_parts(&resolve_usage(argument.usage, &argument.response_json)),
            argument: argument.response_text.clone(),
            prompt: argument.prompt.clone(),
            latest: EvaluationView::new(latest),
            earlier: earlier.iter().map(|e| EvaluationView::new(e)).collect(),
        })
    }
}
