// src/site/mod.rs — Static site rendering from store state

pub mod views;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use minijinja::{context, Environment};
use tracing::{debug, info};

use crate::pairs::PairSpace;
use crate::store::store::Store;
use crate::usage;
use views::{
    evaluations_by_argument, heatmap_rows, histograms, percent, projection, recent_rows,
    DailyTokenRow, PairView, TokenCard, PROJECTION_WINDOW_DAYS, RECENT_LIMIT,
};

const TEMPLATES: [(&str, &str); 6] = [
    ("layout.html", include_str!("templates/layout.html")),
    ("macros.html", include_str!("templates/macros.html")),
    ("heatmap.html", include_str!("templates/heatmap.html")),
    ("diagnostics.html", include_str!("templates/diagnostics.html")),
    ("tokens.html", include_str!("templates/tokens.html")),
    ("pair.html", include_str!("templates/pair.html")),
];

fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    for (name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

/// What one build wrote and removed.
#[derive(Debug, Clone, Default)]
pub struct SiteReport {
    pub index: PathBuf,
    pub pair_pages: usize,
    /// Detail pages deleted because their pair is no longer evaluated.
    pub removed: Vec<String>,
}

pub struct SiteBuilder {
    out_dir: PathBuf,
    space: PairSpace,
    today: Option<NaiveDate>,
}

impl SiteBuilder {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            space: PairSpace::default(),
            today: None,
        }
    }

    /// Fix the projection date instead of using the current UTC day.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Render every page from a full read of the store, then prune orphans.
    pub fn build(&self, store: &Store) -> anyhow::Result<SiteReport> {
        let pairs_dir = self.out_dir.join("pairs");
        std::fs::create_dir_all(&pairs_dir)
            .with_context(|| format!("Failed to create {}", pairs_dir.display()))?;

        let env = environment()?;
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());

        let arguments = store.all_arguments()?;
        let evaluations = store.all_evaluations()?;
        let grouped = evaluations_by_argument(&evaluations);
        let counts = store.counts()?;
        let daily = store.daily_progress()?;
        let summary = usage::summarize(&arguments, &evaluations);

        let generated_percent = percent(counts.generated, counts.total_pairs);
        let evaluated_percent = percent(counts.evaluated, counts.total_pairs);

        // Heatmap, written twice so the landing page and the named page match.
        let heatmap = env.get_template("heatmap.html")?.render(context! {
            root => "",
            counts => context! {
                generated => counts.generated,
                evaluated => counts.evaluated,
                total_pairs => counts.total_pairs,
            },
            generated_percent => &generated_percent,
            evaluated_percent => &evaluated_percent,
            rows => heatmap_rows(self.space, &arguments, &grouped),
        })?;
        let index = self.out_dir.join("index.html");
        write_page(&index, &heatmap)?;
        write_page(&self.out_dir.join("heatmap.html"), &heatmap)?;

        let diagnostics = env.get_template("diagnostics.html")?.render(context! {
            root => "",
            today => today.format("%Y-%m-%d").to_string(),
            counts => context! {
                generated => counts.generated,
                evaluated => counts.evaluated,
                total_pairs => counts.total_pairs,
            },
            generated_percent => &generated_percent,
            evaluated_percent => &evaluated_percent,
            generation_projection => projection(
                counts.total_pairs,
                counts.generated,
                &daily,
                |r| r.generated_count,
                today,
                PROJECTION_WINDOW_DAYS,
            ),
            evaluation_projection => projection(
                counts.total_pairs,
                counts.evaluated,
                &daily,
                |r| r.evaluated_count,
                today,
                PROJECTION_WINDOW_DAYS,
            ),
            tokens => TokenCard::new("Total tokens", &summary.overall),
            histograms => histograms(&store.scores_by_version()?),
            recent => recent_rows(&store.recent_arguments(RECENT_LIMIT)?, &grouped),
        })?;
        write_page(&self.out_dir.join("diagnostics.html"), &diagnostics)?;

        let daily_tokens: Vec<DailyTokenRow> = summary
            .daily
            .iter()
            .map(|d| DailyTokenRow {
                day: d.day.clone(),
                total: views::fmt_tokens(d.overall.total),
                reasoning: views::fmt_tokens(d.overall.reasoning),
                non_reasoning: views::fmt_tokens(d.overall.non_reasoning),
                generation: views::fmt_tokens(d.generation.total),
                evaluation: views::fmt_tokens(d.evaluation.total),
            })
            .collect();
        let tokens = env.get_template("tokens.html")?.render(context! {
            root => "",
            cards => vec![
                TokenCard::new("Total tokens", &summary.overall),
                TokenCard::new("Generation tokens", &summary.generation),
                TokenCard::new("Evaluation tokens", &summary.evaluation),
            ],
            daily => daily_tokens,
        })?;
        write_page(&self.out_dir.join("tokens.html"), &tokens)?;

        let pair_template = env.get_template("pair.html")?;
        let mut expected = HashSet::new();
        for argument in &arguments {
            let Some(rows) = grouped.get(&argument.id) else {
                continue;
            };
            let Some(view) = PairView::new(argument, rows) else {
                continue;
            };
            let name = argument.pair.file_name();
            let html = pair_template.render(context! { root => "../", pair => view })?;
            write_page(&pairs_dir.join(&name), &html)?;
            expected.insert(name);
        }

        let removed = prune_pair_pages(&pairs_dir, &expected)?;
        info!(
            "Site written to {} ({} pair pages, {} removed)",
            self.out_dir.display(),
            expected.len(),
            removed.len()
        );

        Ok(SiteReport {
            index,
            pair_pages: expected.len(),
            removed,
        })
    }
}

fn write_page(path: &Path, html: &str) -> anyhow::Result<()> {
    std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Delete `*.html` detail pages that were not written by this build.
fn prune_pair_pages(pairs_dir: &Path, expected: &HashSet<String>) -> anyhow::Result<Vec<String>> {
    let mut removed = Vec::new();
    for entry in std::fs::read_dir(pairs_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !expected.contains(&name) {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            info!("Removed stale page {}", name);
            removed.push(name);
        }
    }
    removed.sort();
    Ok(removed)
}
