// src/cli/build.rs — `psalm-pairs build`

use std::path::PathBuf;

use crate::infra::config::Config;
use crate::site::SiteBuilder;
use crate::store::Database;

pub fn run_build(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let db = Database::open(&config.db_path())?;
    let out_dir = output.unwrap_or_else(|| config.site_dir());

    let report = SiteBuilder::new(out_dir).build(&db.store)?;

    println!("Wrote {}", report.index.display());
    println!("  {} pair page(s)", report.pair_pages);
    if !report.removed.is_empty() {
        println!("  removed {} stale page(s)", report.removed.len());
    }
    Ok(())
}
