//! CLI entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use toolmux_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::load(&cli.config)?;
    let ctx = bootstrap(config).await?;

    let outcome = match command {
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Tools { server } => handlers::tools::execute(&ctx, server.as_deref()).await,
        Commands::Validate { tool, args } => handlers::validate::execute(&ctx, &tool, &args).await,
        Commands::Call {
            tool,
            args,
            session,
        } => handlers::call::execute(&ctx, &tool, &args, session.as_deref()).await,
    };

    ctx.shutdown().await;
    outcome
}
