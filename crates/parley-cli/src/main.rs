//! CLI entry point - the composition root.
//!
//! Loads configuration, initialises logging, wires the gateway client and
//! speech backend via bootstrap, then dispatches to a handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use parley_cli::{Cli, CliError, Commands, bootstrap, config, handlers};

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.as_ref() else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = config::load_settings(&cli)?;
    let ctx = bootstrap(settings);

    match command {
        Commands::Talk { audio_dir } => {
            ctx.preconnect().await;
            handlers::talk::execute(&ctx, audio_dir.clone()).await?;
        }
        Commands::Ask { text } => {
            handlers::ask::execute(&ctx, &text.join(" ")).await?;
        }
        Commands::Verify => {
            handlers::verify::execute(&ctx).await?;
        }
        Commands::Task { text } => {
            ctx.preconnect().await;
            handlers::task::execute(&ctx, &text.join(" ")).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
