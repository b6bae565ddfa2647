//! Change notification ingestion from JSON lines.
//!
//! Each line on stdin is one [`ChangeNotification`]. Lines are read on a
//! plain thread (tokio's stdin would hold the runtime open at shutdown) and
//! handed to [`ingest`], which publishes them onto the change feed.

use std::io::BufRead;

use tokio::sync::{mpsc, watch};

use autorule_app::ports::ChangePublisher;
use autorule_domain::change::ChangeNotification;

/// Spawn a detached thread forwarding stdin lines into a channel.
///
/// The channel closes on end of input.
pub fn spawn_stdin_reader(capacity: usize) -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel(capacity);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                tracing::error!("failed to read stdin");
                break;
            };
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
        tracing::debug!("stdin closed");
    });
    receiver
}

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns the JSON error for a malformed line.
pub fn parse_line(line: &str) -> Result<Option<ChangeNotification>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Publish every well-formed line until the input ends or `shutdown` flips.
/// Returns how many notifications were published.
pub async fn ingest<P: ChangePublisher>(
    mut lines: mpsc::Receiver<String>,
    publisher: P,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut published = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let line = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        match parse_line(&line) {
            Ok(Some(notification)) => match publisher.publish(notification).await {
                Ok(()) => published += 1,
                Err(error) => tracing::error!(%error, "failed to publish change notification"),
            },
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "skipping malformed change notification"),
        }
    }
    tracing::info!(published, "change ingestion stopped");
    published
}
