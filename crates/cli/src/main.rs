// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fanout: declarative map-reduce AI pipelines.

mod commands;
mod exit_error;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fanout", version, about = "Declarative map-reduce AI pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a pipeline package once
    Run(commands::run::RunArgs),
    /// Cron-driven execution over a directory of pipeline packages
    Scheduler {
        #[command(subcommand)]
        command: commands::scheduler::SchedulerCommand,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Scheduler { command } => commands::scheduler::execute(command).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.code);
        }
    }
}
