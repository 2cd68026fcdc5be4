//! CLI entry point for the pedlar agent.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use pedlar_agent::config::Config;
use pedlar_agent::runner::{self, RunOptions};

#[derive(Parser)]
#[command(name = "pedlar-agent")]
#[command(about = "Periodic rebalancing agent over TrueFX and IEX quotes")]
#[command(version)]
struct Cli {
    /// Path to the agent config (TOML)
    #[arg(long, default_value = "pedlar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trade against live feeds until maxsteps or Ctrl-C
    Live,

    /// Replay a recorded price CSV through the loop
    Backtest {
        /// Price CSV (time,venue,ticker,bid,ask,bid_size,ask_size)
        replay: PathBuf,
    },

    /// Validate the config and print the session settings
    Check,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let opts = RunOptions {
        handle_interrupt: true,
    };

    let result = match cli.command {
        Command::Live => runner::live(&config, &opts),
        Command::Backtest { replay } => runner::backtest(&config, &replay, &opts),
        Command::Check => {
            print_check(&config);
            return;
        }
    };

    match result {
        Ok(summary) => println!("{summary}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn print_check(config: &Config) {
    println!("Config OK");
    println!("  user / strategy: {} / {}", config.agent.user, config.agent.strategy);
    println!(
        "  cash {:.2}, leverage {}, policy {}",
        config.portfolio.starting_cash, config.portfolio.leverage, config.policy.name
    );
    println!(
        "  maxsteps {}, flush every {}, interval {} ms",
        config.agent.maxsteps, config.agent.flush_every, config.pacing.interval_ms
    );
    if config.server.enabled {
        println!("  bookkeeping: {}", config.server.url);
    } else {
        println!("  bookkeeping: disabled");
    }
    println!("  universe:");
    for entry in &config.portfolio.universe {
        println!("    {entry}");
    }
}
