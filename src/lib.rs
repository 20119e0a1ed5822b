pub mod adapter;
pub mod catalog;
pub mod config;
pub mod db;
pub mod differ;
pub mod error;
pub mod estimator;
pub mod feed;
pub mod handlers;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod plan;
pub mod users;

#[cfg(test)]
pub mod test_utils;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use config::EngineConfig;
use db::AppState;
use error::EngineError;
use estimator::ActivityEstimator;
use feed::{ChangeEvent, ChangeFeed, Outcome};

const FEED_CAPACITY: usize = 64;

/// Entry point for the binary: read events as JSON lines on stdin and write
/// one JSON outcome per line to stdout until stdin closes.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let config = EngineConfig::from_env()?;
  logging::init_logging(&config);

  let store = db::initialize_db(&config).await?;
  ledger::normalize_legacy_keys(&store).await?;

  let estimator = ActivityEstimator::from_config(&config)?;
  if estimator.is_none() {
    tracing::warn!("KCAL_ESTIMATOR_URL not set, activity logging is disabled");
  }

  let state = AppState {
    store: store.clone(),
    config,
    estimator,
  };

  let handled = serve(state, tokio::io::stdin(), tokio::io::stdout()).await?;
  tracing::info!(handled, "Input closed, shutting down");

  store.close().await;
  Ok(())
}

/// Pump events from `input` through the change feed and write outcomes to
/// `output`. Returns the number of events handled, follow-ups included.
pub async fn serve<R, W>(state: AppState, input: R, output: W) -> std::io::Result<usize>
where
  R: AsyncRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let (events_tx, feed) = ChangeFeed::channel(FEED_CAPACITY);
  let (outcomes_tx, outcomes_rx) = mpsc::channel(FEED_CAPACITY);

  let (read, handled, written) = tokio::join!(
    read_events(input, events_tx, outcomes_tx.clone()),
    feed.run(state, outcomes_tx),
    write_outcomes(output, outcomes_rx),
  );

  read?;
  written?;
  Ok(handled)
}

async fn read_events<R: AsyncRead + Unpin>(
  input: R,
  events: mpsc::Sender<ChangeEvent>,
  outcomes: mpsc::Sender<Outcome>,
) -> std::io::Result<()> {
  let mut reader = BufReader::new(input);
  let mut buf = Vec::new();
  let mut line_no = 0;

  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    line_no += 1;

    let parsed = match std::str::from_utf8(&buf) {
      Ok(line) if line.trim().is_empty() => continue,
      Ok(line) => serde_json::from_str::<ChangeEvent>(line).map_err(|e| e.to_string()),
      Err(_) => Err("invalid UTF-8".to_string()),
    };

    match parsed {
      Ok(event) => {
        if events.send(event).await.is_err() {
          break;
        }
      }
      Err(reason) => {
        tracing::warn!(line = line_no, error = %reason, "Ignoring unreadable event");
        let rejected = Outcome::Failed {
          event: "unreadable".into(),
          user_id: None,
          error: EngineError::InvalidRequest(format!("line {}: {}", line_no, reason)),
        };
        if outcomes.send(rejected).await.is_err() {
          break;
        }
      }
    }
  }

  Ok(())
}

async fn write_outcomes<W: AsyncWrite + Unpin>(
  mut output: W,
  mut outcomes: mpsc::Receiver<Outcome>,
) -> std::io::Result<()> {
  while let Some(outcome) = outcomes.recv().await {
    let mut line = serde_json::to_vec(&outcome)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
  }
  Ok(())
}
