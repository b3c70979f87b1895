//! Quill CLI - keep a tagged journal from the terminal
//!
//! Every command goes through the capability bundle spawned over the local
//! SQLite store.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::archive::run_archive;
use crate::commands::common::{open_app, resolve_config, resolve_db_path};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, TagEdit};
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::tags::run_tags;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.command.is_none() && cli.entry.is_empty() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let config = resolve_config(cli.config.as_deref())?;
    let app = open_app(&resolve_db_path(cli.db_path, &config), &config)?;

    match cli.command {
        Some(Commands::Add { content, tags }) => run_add(&app, &content, &tags).await?,
        Some(Commands::List {
            tag,
            limit,
            oldest_first,
            json,
        }) => run_list(&app, tag.as_deref(), limit, oldest_first, json).await?,
        Some(Commands::Edit {
            id,
            content,
            tags,
            clear_tags,
        }) => run_edit(&app, &id, &content, TagEdit::from_args(&tags, clear_tags)).await?,
        Some(Commands::Delete { id }) => run_delete(&app, &id).await?,
        Some(Commands::Archive { by, json }) => run_archive(&app, by, json).await?,
        Some(Commands::Tags { json }) => run_tags(&app, json).await?,
        Some(Commands::Watch { replay }) => run_watch(&app, replay).await?,
        Some(Commands::Export { format, output }) => {
            run_export(&app, format, output.as_deref()).await?;
        }
        // Quick capture mode: quill "my entry"
        None => run_add(&app, &cli.entry, &[]).await?,
    }

    Ok(())
}
