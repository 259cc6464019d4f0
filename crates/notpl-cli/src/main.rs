/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! notpl CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "notpl")]
#[command(version)]
#[command(about = "Render templates with embedded Lua", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template and print the output
    Render {
        /// Template file, or template text with --code
        input: String,

        /// Treat INPUT as template text instead of a path
        #[arg(long)]
        code: bool,

        /// Scope as a JSON object
        #[arg(long, conflicts_with = "scope_file")]
        scope: Option<String>,

        /// Read the scope from a JSON file
        #[arg(long)]
        scope_file: Option<String>,

        /// Start and stop delimiters
        #[arg(long, num_args = 2, value_names = ["START", "STOP"])]
        delimiters: Option<Vec<String>>,

        /// Output style (compressed, compact, preserve)
        #[arg(long)]
        style: Option<String>,

        /// Diagnostic level: 0 silent, 1 errors, 2 warnings, 3 notices
        #[arg(long)]
        reporting: Option<u8>,

        /// Keep partial output when a fragment fails
        #[arg(long)]
        no_halt: bool,

        /// Render this many times and print the last output
        #[arg(long, default_value_t = 1)]
        times: u32,

        /// Also write each render to a file in DIR
        #[arg(long)]
        output_dir: Option<String>,
    },

    /// Render a template and print its statistics as JSON
    Stats {
        /// Template file
        input: String,

        /// Number of renders before reporting
        #[arg(long, default_value_t = 1)]
        times: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notpl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            code,
            scope,
            scope_file,
            delimiters,
            style,
            reporting,
            no_halt,
            times,
            output_dir,
        } => commands::render::execute(commands::render::RenderArgs {
            input,
            code,
            scope,
            scope_file,
            delimiters,
            style,
            reporting,
            no_halt,
            times,
            output_dir,
        }),
        Commands::Stats { input, times } => commands::stats::execute(&input, times),
    }
}
