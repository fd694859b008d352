// crates/cli/src/main.rs

use anyhow::{Context, Result};
use bookshelf_config::{Config, ConfigManager};
use bookshelf_resilience::CancellationToken;
use clap::{value_parser, Arg, ArgMatches, Command};

mod commands;
mod services;

use services::Services;

fn build_cli() -> Command {
    Command::new("bookshelf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Keeps a Meilisearch index of a Calibre library and serves it over HTTP")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Path to config.toml (defaults to the platform config directory)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default configuration file"))
        .subcommand(
            Command::new("serve").about("Provision the indexes and serve the HTTP API"),
        )
        .subcommand(
            Command::new("reindex").about("Rebuild the search index from the metadata source"),
        )
        .subcommand(Command::new("provision").about("Create and configure both indexes"))
        .subcommand(
            Command::new("search")
                .about("Search for books")
                .arg(Arg::new("query").required(true).value_name("QUERY").help("Search query"))
                .arg(
                    Arg::new("limit")
                        .short('l')
                        .long("limit")
                        .value_name("N")
                        .help("Maximum number of hits")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show detailed information about a book")
                .arg(Arg::new("id").required(true).value_name("BOOK_ID").help("Book ID")),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    let manager = match matches.get_one::<String>("config") {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new(),
    };
    manager.context("Failed to locate configuration")
}

fn init_logging(config: &Config) {
    let default_filter = config.app.effective_log_level().to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Cancels `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupt received, shutting down");
                token.cancel();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;
    let config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;
    init_logging(&config);

    if let Some(("init", _)) = matches.subcommand() {
        return commands::init_config(&manager);
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let Some((name, sub_matches)) = matches.subcommand() else {
        build_cli().print_help()?;
        return Ok(());
    };

    let services = Services::from_config(config, cancel).await?;
    match name {
        "serve" => commands::serve(&services).await,
        "reindex" => commands::reindex(&services).await.map(|_| ()),
        "provision" => commands::provision(&services).await,
        "search" => commands::search(&services, sub_matches).await,
        "info" => commands::info(&services, sub_matches).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
