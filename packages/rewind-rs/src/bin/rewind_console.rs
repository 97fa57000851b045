//! Line-oriented devtools console for a demo counter.
//!
//! Reads JSON lines from stdin and prints the messages a devtools console
//! would receive to stdout, one JSON object per line. Logs go to stderr.
//!
//! Input lines:
//! - `{"action": {"type": "ADD", "amount": 2}}` dispatches a domain action
//! - `{"console": {"type": "DISPATCH", "payload": {"type": "COMMIT"}}}`
//!   delivers a console message

use anyhow::{Context, Result};
use async_trait::async_trait;
use rewind::{
    ActionCreator, ActionCreators, Connection, CreatorNode, Devtools, DevtoolsConfig,
    IncomingMessage, Session, SessionInput,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// Demo domain
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum CounterAction {
    Add { amount: i64 },
    Reset,
}
rewind::serde_action!(CounterAction);

fn counter(state: &Counter, action: &CounterAction) -> Result<Counter> {
    Ok(match action {
        CounterAction::Add { amount } => Counter {
            count: state
                .count
                .checked_add(*amount)
                .context("counter overflowed")?,
        },
        CounterAction::Reset => Counter { count: 0 },
    })
}

fn creators() -> ActionCreators<CounterAction> {
    let add = ActionCreator::new("add", |args: &[Value]| {
        let amount = args.first().and_then(Value::as_i64).unwrap_or(1);
        Ok(CounterAction::Add { amount })
    })
    .with_args(&["amount"]);
    let reset = ActionCreator::new("reset", |_: &[Value]| Ok(CounterAction::Reset));

    let counter = [("add", add), ("reset", reset)]
        .into_iter()
        .map(|(key, creator)| (key.to_string(), CreatorNode::from(creator)))
        .collect();
    ActionCreators::Map(
        [("counter".to_string(), CreatorNode::Namespace(counter))]
            .into_iter()
            .collect(),
    )
}

// ============================================================================
// Stdio transport
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum InputLine {
    Action(CounterAction),
    Console(Value),
}

struct StdoutConnection;

#[async_trait]
impl Connection for StdoutConnection {
    async fn init(&self, state: Value) -> Result<()> {
        println!("{}", json!({"type": "INIT", "state": state}));
        Ok(())
    }

    async fn send(&self, action: Option<Value>, state: Value) -> Result<()> {
        println!("{}", json!({"type": "ACTION", "action": action, "state": state}));
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<SessionInput<CounterAction>> {
    let input: InputLine =
        serde_json::from_str(line).context("input must be an action or console line")?;
    Ok(match input {
        InputLine::Action(action) => SessionInput::Dispatch(action),
        InputLine::Console(message) => {
            SessionInput::Console(IncomingMessage::parse(&message.to_string())?)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rewind=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let config = DevtoolsConfig::from_env()
        .context("Failed to load devtools configuration")?
        .action_creators(creators());

    let devtools = Devtools::builder(counter, Counter { count: 0 })
        .config(config)
        .build();
    println!("{}", json!({"type": "CONNECT", "options": devtools.connect_options()}));

    let (tx, rx) = mpsc::unbounded_channel();
    let session = tokio::spawn(Session::new(devtools.into_shared(), StdoutConnection).run(rx));

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(input) => {
                if tx.send(input).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable input line"),
        }
    }
    drop(tx);

    session.await.context("Session task panicked")?
}
