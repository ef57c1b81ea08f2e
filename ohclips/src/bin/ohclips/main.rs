mod commands;
mod output;
mod theme;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ohclips::{AppConfig, logging};

use commands::{
    serve::{ServeArgs, handle_serve},
    stats::{StatsArgs, handle_stats},
    token::{TokenArgs, handle_token},
};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::THEME;

#[derive(Parser)]
#[command(name = "ohclips")]
#[command(version)]
#[command(
    about = "Clip sharing backend",
    long_about = r#"ohclips serves the clip sharing API and inspects its store.

Configuration comes from OHCLIPS_* environment variables (a .env file is
read first). Flags below override the matching variables.

Commands:
  serve   Run the HTTP API
  stats   Print user and clip counts
  token   Mint a development bearer token
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Print user and clip counts
    Stats(StatsArgs),

    /// Mint a development bearer token for a principal id
    Token(TokenArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli.command, &output).await {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    logging::init(&config.log_level, config.is_production());

    if !output.options.quiet && !matches!(output.options.output_format, OutputFormat::Json) {
        let env = if output.options.no_color {
            config.app_env.clone()
        } else {
            config.app_env.color(THEME.highlight).bold().to_string()
        };
        println!("ohclips ({env})");
    }

    match command {
        Commands::Serve(args) => handle_serve(args, config, output).await,
        Commands::Stats(args) => handle_stats(args, config, output).await,
        Commands::Token(args) => handle_token(args, &config, output),
    }
}
