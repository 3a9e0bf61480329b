// src/cli/evaluate.rs — `psalm-pairs evaluate`

use crate::evaluator::{Evaluator, EvaluatorOptions};
use crate::infra::config::Config;
use crate::provider::resolver;
use crate::psalms::PsalmLibrary;
use crate::store::Database;

pub async fn run_evaluate(
    config: &Config,
    limit: Option<usize>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let provider = resolver::provider_from_config(config)?;
    let db = Database::open(&config.db_path())?;
    let items = PsalmLibrary::new(config.psalms_dir());

    let mut options =
        EvaluatorOptions::new(model.unwrap_or_else(|| config.models.evaluator.clone()));
    options.reasoning_effort = Some(config.openai.evaluation_effort.clone());
    let limit = limit.unwrap_or(config.limits.evaluate);

    let report = Evaluator::new(provider.as_ref(), &db.store, &items, options)
        .run(limit)
        .await?;

    tracing::info!("Evaluation finished: {}", report.batch);
    println!("Evaluated {} arguments", report.batch.completed);
    if !report.key_order_warnings.is_empty() {
        println!(
            "{} payload(s) arrived with keys out of order",
            report.key_order_warnings.len()
        );
    }
    if !report.batch.skipped.is_empty() {
        println!(
            "Skipped {} argument(s); they stay pending:",
            report.batch.skipped.len()
        );
        for skipped in &report.batch.skipped {
            println!("  {}: {}", skipped.item, skipped.reason);
        }
    }
    Ok(())
}
