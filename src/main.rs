// src/main.rs — psalm-pairs entry point

use clap::Parser;

use psalm_pairs::cli::{self, Cli, Commands};
use psalm_pairs::infra::config::Config;
use psalm_pairs::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (respects RUST_LOG)
    logger::init_logging(logger::level_for(cli.quiet()));

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            config
        }
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.paths.database = Some(db);
    }

    match cli.command {
        Commands::Generate { limit, model, .. } => {
            cli::generate::run_generate(&config, limit, model).await
        }
        Commands::Evaluate { limit, model, .. } => {
            cli::evaluate::run_evaluate(&config, limit, model).await
        }
        Commands::Build { output } => cli::build::run_build(&config, output),
        Commands::Status => cli::status::show_status(&config),
        Commands::Schema => cli::schema::run_schema(&config),
    }
}
