mod clipboard;
mod commands;
mod config;
mod gateway;
mod logging;
mod theme;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crib")]
#[command(about = "Offline-first cache gateway for outbound HTTP requests")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./crib.yaml, then $XDG_CONFIG_HOME/crib/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to a daily rolling file in the data directory instead of stderr
  #[arg(long)]
  log_file: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch URLs through the cache gateway, serving cached responses first
  Fetch {
    /// URLs to fetch, in order (relative URLs need base_url)
    #[arg(required = true)]
    urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra request header, as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body, e.g. -X POST -d 'name=crib'
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Use an in-memory store that is discarded on exit
    #[arg(long)]
    ephemeral: bool,

    /// Print the status line and headers before the body
    #[arg(short, long)]
    include: bool,
  },

  /// Copy text to the clipboard (best effort)
  Copy {
    text: String,
  },

  /// Print the theme configuration, or a single color or font
  Theme {
    /// Color or font name, e.g. nostr-dark or robomono
    name: Option<String>,

    /// Print JSON instead of YAML
    #[arg(long)]
    json: bool,
  },

  /// List cache stores and their entry counts
  Stores,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let log_dir = if args.log_file {
    Some(config::Config::data_dir()?)
  } else {
    None
  };
  let _log_guard = logging::init(log_dir.as_deref())?;

  match args.command {
    Command::Fetch {
      urls,
      method,
      headers,
      data,
      ephemeral,
      include,
    } => {
      let options = commands::FetchOptions {
        urls,
        method,
        headers,
        data,
        ephemeral,
        include,
      };
      commands::fetch(&config, options).await
    }
    Command::Copy { text } => {
      commands::copy(&text);
      Ok(())
    }
    Command::Theme { name, json } => commands::theme(name.as_deref(), json),
    Command::Stores => commands::stores(&config),
  }
}
