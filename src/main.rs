//! treatment-cli entry point

use clap::Parser;
use treatment_classifier::cli::{cmd_importances, cmd_options, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treatment_classifier=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data } => cmd_train(&data)?,
        Commands::Predict { data, profile, answers } => cmd_predict(&data, profile.as_deref(), &answers)?,
        Commands::Importances { data, top } => cmd_importances(&data, top)?,
        Commands::Options => cmd_options()?,
    }

    Ok(())
}
