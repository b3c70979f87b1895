use std::sync::Arc;
use std::time::Duration;

use quill_core::store::Since;
use quill_core::{Entry, Listener, SubscribeOptions};

use crate::commands::common::{format_change_line, App};
use crate::error::CliError;

/// How often commits from other processes are picked up
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_watch(app: &App, replay: bool) -> Result<(), CliError> {
    let options = SubscribeOptions {
        since: if replay { Since::Beginning } else { Since::Now },
    };
    let listener: Listener = Arc::new(|entry: Entry, deleted: bool| {
        println!("{}", format_change_line(&entry, deleted));
    });
    let subscription = app.rights.subscribe(options, listener).await?;
    tracing::info!(
        subscription = subscription.id,
        "Watching for changes, press Ctrl-C to stop"
    );

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = poll.tick() => {
                app.store.catch_up().await?;
            }
        }
    }

    Ok(())
}
