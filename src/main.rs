//! ML Builder - Main Entry Point
//!
//! Serves the model-building API or runs the workflow from the command line.

use clap::Parser;
use ml_builder::cli::{cmd_inspect, cmd_predict, cmd_serve, cmd_train, train_params, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ml_builder=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(host, port).await?;
        }
        Commands::Train {
            data,
            target,
            method,
            model,
            test_size,
            hidden_layers,
            learning_rate,
            max_iter,
            max_depth,
            save,
            models_dir,
        } => {
            let params = train_params(hidden_layers.as_deref(), learning_rate, max_iter, max_depth);
            cmd_train(
                &data,
                &target,
                &method,
                &model,
                test_size,
                params,
                save.as_deref(),
                models_dir,
            )
            .await?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Inspect { data } => {
            cmd_inspect(&data)?;
        }
    }

    Ok(())
}
