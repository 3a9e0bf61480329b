// src/cli/status.rs — Progress display

use crate::infra::config::Config;
use crate::psalms::PsalmLibrary;
use crate::site::views::{fmt_tokens, percent};
use crate::store::Database;
use crate::usage;

pub fn show_status(config: &Config) -> anyhow::Result<()> {
    let db_path = config.db_path();
    let db_exists = db_path.exists();
    let db_size = if db_exists {
        std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0)
    } else {
        0
    };

    println!("psalm-pairs v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let psalms_dir = config.psalms_dir();
    match PsalmLibrary::new(&psalms_dir).available() {
        Ok(numbers) => println!(
            "  Psalms:     {} file(s) in {}",
            numbers.len(),
            psalms_dir.display()
        ),
        Err(_) => println!("  Psalms:     (missing {})", psalms_dir.display()),
    }

    if !db_exists {
        println!("  Database:   (not initialized)");
        return Ok(());
    }
    println!(
        "  Database:   {} ({})",
        db_path.display(),
        format_bytes(db_size)
    );

    let db = Database::open(&db_path)?;
    let counts = db.store.counts()?;
    println!(
        "  Generated:  {} / {} ({}%)",
        counts.generated,
        counts.total_pairs,
        percent(counts.generated, counts.total_pairs)
    );
    println!(
        "  Evaluated:  {} / {} ({}%)",
        counts.evaluated,
        counts.total_pairs,
        percent(counts.evaluated, counts.total_pairs)
    );

    let by_version = db.store.scores_by_version()?;
    if !by_version.is_empty() {
        println!();
        println!("  Evaluations by rubric version:");
        for (version, scores) in &by_version {
            println!("    v{}: {}", version, scores.len());
        }
    }

    let summary = usage::aggregate(&db.store)?;
    println!();
    println!("  Tokens:     {}", fmt_tokens(summary.overall.total));
    println!("    generation: {}", fmt_tokens(summary.generation.total));
    println!("    evaluation: {}", fmt_tokens(summary.evaluation.total));
    if summary.overall.unknown > 0 {
        println!("    ({} record(s) without usage data)", summary.overall.unknown);
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
