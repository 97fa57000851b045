//! Session pump between a host, the engine, and a console connection.
//!
//! The session owns the receiving end of an input channel. Each input is
//! applied to the engine and the outbox is flushed to the [`Connection`]
//! before the next input is read.
//!
//! # Guarantees
//!
//! - **Ordered**: inputs are applied in arrival order and messages are sent in
//!   log order
//! - **No lock across awaits**: the engine lock is released before anything
//!   is sent
//! - **Reducer failures stop the session**: the domain error is returned as-is;
//!   every other error is logged and the session keeps going
//!
//! A rejected snapshot (`Snapshot`, `MissingSnapshot`, `History`) leaves the
//! engine where it was while the console already shows the requested
//! history. The two stay out of sync until the next `Init` reaches the
//! console, e.g. after a COMMIT or RESET. Hosts that cannot tolerate that
//! should drive the engine directly and handle those errors themselves.
//!
//! # Example
//!
//! ```ignore
//! let devtools = Devtools::builder(counter, 0).build().into_shared();
//! let (tx, rx) = mpsc::unbounded_channel();
//!
//! tokio::spawn(Session::new(devtools.clone(), connection).run(rx));
//!
//! tx.send(SessionInput::Dispatch(CounterAction::Add { amount: 1 }))?;
//! tx.send(SessionInput::Console(IncomingMessage::parse(&line)?))?;
//! ```

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::core::{Action, Reducer};
use crate::engine::SharedDevtools;
use crate::error::DevtoolsError;
use crate::messages::IncomingMessage;
use crate::outbox::{deliver, Connection};

/// One input to a running session.
#[derive(Debug, Clone)]
pub enum SessionInput<A> {
    /// A message from the console.
    Console(IncomingMessage),
    /// A domain action from the host.
    Dispatch(A),
}

/// Forwards inputs to an engine and its outbox to a connection.
pub struct Session<S, A, R, C> {
    devtools: SharedDevtools<S, A, R>,
    connection: C,
}

impl<S, A, R, C> Session<S, A, R, C>
where
    S: Clone + Serialize + DeserializeOwned,
    A: Action,
    R: Reducer<S, A>,
    C: Connection,
{
    /// Create a session for `devtools` sending to `connection`.
    pub fn new(devtools: SharedDevtools<S, A, R>, connection: C) -> Self {
        Self {
            devtools,
            connection,
        }
    }

    /// The engine this session drives.
    pub fn devtools(&self) -> &SharedDevtools<S, A, R> {
        &self.devtools
    }

    /// Send every pending log entry. Returns how many were sent.
    pub async fn flush(&self) -> Result<usize> {
        let messages = self.devtools.drain_outbound();
        let count = messages.len();
        for message in messages {
            let kind = message.name();
            deliver(&self.connection, message)
                .await
                .with_context(|| format!("failed to send {} message to console", kind))?;
        }
        Ok(count)
    }

    /// Apply one input, then flush.
    pub async fn step(&self, input: SessionInput<A>) -> Result<()> {
        let applied = match input {
            SessionInput::Console(message) => {
                let name = message.name();
                let instance = self.devtools.lock().instance_id().to_string();
                if matches!(message, IncomingMessage::Start | IncomingMessage::Stop) {
                    info!(%instance, message = name, "console lifecycle message");
                }
                self.devtools.receive(message).map_err(|e| (name, e))
            }
            SessionInput::Dispatch(action) => {
                self.devtools.dispatch(action).map_err(|e| ("dispatch", e))
            }
        };

        match applied {
            Ok(()) => {}
            Err((_, DevtoolsError::Reducer(e))) => return Err(e),
            Err((input, e)) => error!(input, error = %e, "devtools input failed"),
        }

        let sent = self.flush().await?;
        debug!(sent, "flushed outbox");
        Ok(())
    }

    /// Run until the input channel closes.
    ///
    /// The `Init` entry created with the engine is sent before the first
    /// input is read.
    pub async fn run(self, mut inputs: UnboundedReceiver<SessionInput<A>>) -> Result<()> {
        info!(
            instance = %self.devtools.lock().instance_id(),
            "devtools session starting"
        );
        self.flush().await?;

        while let Some(input) = inputs.recv().await {
            self.step(input).await?;
        }

        info!("devtools session input closed");
        Ok(())
    }
}
