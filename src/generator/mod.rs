// src/generator/mod.rs — Argument generation for pending pairs

use minijinja::{context, Environment};
use tracing::{info, warn};

use crate::batch::BatchReport;
use crate::infra::errors::PipelineError;
use crate::pairs::{PairKey, PairSpace};
use crate::provider::{ModelProvider, ModelResponse, ResponseRequest};
use crate::psalms::ItemSource;
use crate::store::store::{NewArgument, Store};

const PROMPT_TEMPLATE: &str = "\
Consider Psalm {{ x }} and Psalm {{ y }} (reproduced below). What arguments could you make to justify that Psalm {{ y }} logically follows on from Psalm {{ x }}? Consider stylistic similarities, similarities of form, similarities of vocab or ideas, shared roots (if you're doing the search in Hebrew), connections to sequences of events common in ancient Israelite life, mythology or history shared by the two psalms.

Rarer words are more significant than commoner words. Identical forms are more significant than similar forms. The same word class is more significant than different word classes formed from the same root. Identical roots are more significant than suppletive roots.

Psalm {{ x }}:
{{ psalm_x }}

Psalm {{ y }}:
{{ psalm_y }}
";

/// Render the generation request for one pair.
pub fn build_prompt(pair: PairKey, items: &dyn ItemSource) -> Result<String, PipelineError> {
    let psalm_x = items.format_item(pair.source())?;
    let psalm_y = items.format_item(pair.target())?;

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("generate", PROMPT_TEMPLATE)
        .map_err(|e| PipelineError::Config(format!("generation template: {e}")))?;
    let prompt = env
        .get_template("generate")
        .and_then(|t| {
            t.render(context! {
                x => pair.source(),
                y => pair.target(),
                psalm_x => psalm_x,
                psalm_y => psalm_y,
            })
        })
        .map_err(|e| PipelineError::Config(format!("generation template: {e}")))?;
    Ok(prompt)
}

/// Generation options for one run.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
}

pub struct Generator<'a> {
    provider: &'a dyn ModelProvider,
    store: &'a Store,
    items: &'a dyn ItemSource,
    space: PairSpace,
    options: GeneratorOptions,
}

impl<'a> Generator<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        store: &'a Store,
        items: &'a dyn ItemSource,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            provider,
            store,
            items,
            space: PairSpace::default(),
            options,
        }
    }

    /// Restrict the scan to a smaller universe.
    pub fn with_space(mut self, space: PairSpace) -> Self {
        self.space = space;
        self
    }

    /// Generate arguments for up to `limit` pending pairs.
    ///
    /// A failed pair is logged and left pending; only store failures abort.
    pub async fn run(&self, limit: usize) -> anyhow::Result<BatchReport> {
        let todo = self.space.pending_pairs(self.store, limit)?;
        let mut report = BatchReport::with_selected(todo.len());
        if todo.is_empty() {
            info!("No remaining Psalm pairs to generate.");
            return Ok(report);
        }

        for pair in todo {
            let (prompt, response) = match self.request(pair).await {
                Ok(ok) => ok,
                Err(e) => {
                    report.fail(pair.to_string(), e)?;
                    continue;
                }
            };

            let raw = response.raw_json();
            let inserted = self.store.insert_pair_argument(&NewArgument {
                pair,
                prompt: &prompt,
                response_text: &response.output_text,
                response_json: &raw,
                model: &self.options.model,
                usage: response.usage,
            })?;

            match inserted {
                Some(id) => {
                    info!("Stored argument {} for Psalms {}", id, pair);
                    report.completed += 1;
                }
                None => {
                    let reason = "store already holds an argument; another writer got there first";
                    warn!("Skipping pair {}: {}", pair, reason);
                    report.skip(pair.to_string(), reason);
                }
            }
        }

        Ok(report)
    }

    async fn request(&self, pair: PairKey) -> Result<(String, ModelResponse), PipelineError> {
        let prompt = build_prompt(pair, self.items)?;
        info!("Requesting argument for Psalms {}", pair);

        let response = self
            .provider
            .respond(ResponseRequest {
                model: self.options.model.clone(),
                input: prompt.clone(),
                reasoning_effort: self.options.reasoning_effort.clone(),
                verbosity: self.options.verbosity.clone(),
                ..Default::default()
            })
            .await?;

        if response.output_text.trim().is_empty() {
            return Err(PipelineError::EmptyResponse {
                provider: self.provider.id().to_string(),
            });
        }
        Ok((prompt, response))
    }
}
