// src/cli/generate.rs — `psalm-pairs generate`

use crate::generator::{Generator, GeneratorOptions};
use crate::infra::config::Config;
use crate::provider::resolver;
use crate::psalms::PsalmLibrary;
use crate::store::Database;

pub async fn run_generate(
    config: &Config,
    limit: Option<usize>,
    model: Option<String>,
) -> anyhow::Result<()> {
    // Credential first: nothing is opened or written without it.
    let provider = resolver::provider_from_config(config)?;
    let db = Database::open(&config.db_path())?;
    let items = PsalmLibrary::new(config.psalms_dir());

    let options = GeneratorOptions {
        model: model.unwrap_or_else(|| config.models.generator.clone()),
        reasoning_effort: Some(config.openai.generation_effort.clone()),
        verbosity: Some(config.openai.verbosity.clone()),
    };
    let limit = limit.unwrap_or(config.limits.generate);

    let report = Generator::new(provider.as_ref(), &db.store, &items, options)
        .run(limit)
        .await?;

    tracing::info!("Generation finished: {}", report);
    println!("Generated {} new arguments", report.completed);
    if !report.skipped.is_empty() {
        println!("Skipped {} pair(s); they stay pending:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.item, skipped.reason);
        }
    }
    Ok(())
}
