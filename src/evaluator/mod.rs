// src/evaluator/mod.rs — Rubric scoring of stored arguments

pub mod parser;
pub mod rubric;

use tracing::{debug, info, warn};

use crate::batch::BatchReport;
use crate::infra::errors::PipelineError;
use crate::pairs::PairSpace;
use crate::provider::{ModelProvider, ModelResponse, ResponseRequest};
use crate::psalms::ItemSource;
use crate::store::store::{ArgumentRow, NewEvaluation, Store};
use parser::{parse_tool_call, ParsedEvaluation};
use rubric::{EVALUATOR_VERSION, TOOL_NAME};

#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    pub model: String,
    pub reasoning_effort: Option<String>,
    /// Rubric version written on new records and used to find pending work.
    pub version: u32,
}

impl EvaluatorOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reasoning_effort: Some("medium".into()),
            version: EVALUATOR_VERSION,
        }
    }
}

/// Evaluation run outcome.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub batch: BatchReport,
    /// Argument ids whose payload keys arrived out of canonical order.
    pub key_order_warnings: Vec<i64>,
}

pub struct Evaluator<'a> {
    provider: &'a dyn ModelProvider,
    store: &'a Store,
    items: &'a dyn ItemSource,
    space: PairSpace,
    options: EvaluatorOptions,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        store: &'a Store,
        items: &'a dyn ItemSource,
        options: EvaluatorOptions,
    ) -> Self {
        Self {
            provider,
            store,
            items,
            space: PairSpace::default(),
            options,
        }
    }

    /// Score up to `limit` arguments that lack a record at the current version.
    pub async fn run(&self, limit: usize) -> anyhow::Result<EvaluationReport> {
        let rows = self
            .space
            .pending_evaluations(self.store, limit, self.options.version)?;
        let mut report = EvaluationReport {
            batch: BatchReport::with_selected(rows.len()),
            ..Default::default()
        };
        if rows.is_empty() {
            info!("No pending evaluations.");
            return Ok(report);
        }

        for row in &rows {
            let label = format!("argument {} ({})", row.id, row.pair);
            let (response, parsed) = match self.evaluate(row).await {
                Ok(ok) => ok,
                Err(e) => {
                    report.batch.fail(label, e)?;
                    continue;
                }
            };

            let payload = &parsed.payload;
            if !parsed.key_order.is_canonical() {
                warn!(
                    "{} keys for {} arrived as [{}], expected [{}]",
                    TOOL_NAME,
                    label,
                    parsed.key_order.joined(),
                    parsed.key_order.expected().join(",")
                );
                report.key_order_warnings.push(row.id);
            }
            let unknown = payload.unknown_flags();
            if !unknown.is_empty() {
                warn!("Unknown flags for {}: {}", label, unknown.join(", "));
            }

            let checks_json = serde_json::to_string(&payload.checks)?;
            let flags_json = serde_json::to_string(&payload.flags)?;
            let evaluation_json = response.raw_json();
            let inserted = self.store.insert_evaluation(&NewEvaluation {
                argument_id: row.id,
                evaluator_version: self.options.version,
                evaluator_model: &self.options.model,
                score: payload.score,
                justification: &payload.justification,
                checks_json: &checks_json,
                flags_json: &flags_json,
                vocabulary_specificity: payload.vocabulary_specificity,
                key_order: &parsed.key_order.joined(),
                evaluation_json: &evaluation_json,
                usage: response.usage,
            })?;

            match inserted {
                Some(id) => {
                    info!(
                        "Stored evaluation {} for {}: score {}",
                        id, label, payload.score
                    );
                    report.batch.completed += 1;
                }
                None => {
                    // The scan selected it as pending, so a record appeared mid-run.
                    let reason = format!(
                        "store refused the v{} record; another writer got there first",
                        self.options.version
                    );
                    warn!("Skipping {}: {}", label, reason);
                    report.batch.skip(label, reason);
                }
            }
        }

        Ok(report)
    }

    async fn evaluate(
        &self,
        row: &ArgumentRow,
    ) -> Result<(ModelResponse, ParsedEvaluation), PipelineError> {
        let x = row.pair.source();
        let y = row.pair.target();
        let input = rubric::render_input(
            x,
            y,
            &self.items.format_item(x)?,
            &self.items.format_item(y)?,
            &row.response_text,
        )?;
        info!("Evaluating argument {} ({})", row.id, row.pair);

        let response = self
            .provider
            .respond(ResponseRequest {
                model: self.options.model.clone(),
                input,
                reasoning_effort: self.options.reasoning_effort.clone(),
                verbosity: None,
                tools: vec![rubric::tool_def()],
                tool_choice: Some(TOOL_NAME.into()),
            })
            .await?;
        debug!("Raw response for argument {}: {}", row.id, response.raw);

        let parsed = parse_tool_call(&response)?;
        Ok((response, parsed))
    }
}
