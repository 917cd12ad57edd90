//! Salary predictor - Main Entry Point

use clap::Parser;
use salary_predictor::cli::{cmd_cv, cmd_tune, load_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salary_predictor=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cv { common, folds, no_params, baseline, isolate_failures } => {
            let config = load_config(cli.config.as_deref(), &common)?;
            cmd_cv(config, folds, no_params, baseline, isolate_failures)?;
        }
        Commands::Tune { common, trials, sampler, study_file, catch_failures } => {
            let config = load_config(cli.config.as_deref(), &common)?;
            cmd_tune(config, trials, sampler.as_deref(), study_file, catch_failures)?;
        }
    }

    Ok(())
}
