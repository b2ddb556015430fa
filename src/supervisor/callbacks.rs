//! Delivery of supervised process output to the caller.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::cli::{DecodedEvent, SemanticEvent};

/// Error-side traffic from a supervised process.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorEvent {
    /// A complete line on stderr. Expected traffic, not necessarily fatal.
    Stderr(DecodedEvent),
    /// A runtime failure (read error, stdin write failure, wait failure).
    Process(String),
}

impl ErrorEvent {
    /// Human-readable text of the event.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Stderr(DecodedEvent::Text(line)) => line.clone(),
            Self::Stderr(DecodedEvent::Json(value)) => value.to_string(),
            Self::Process(message) => message.clone(),
        }
    }
}

/// Sink for events from a supervised process.
///
/// Events of one stream arrive in order. `on_close` comes after every data
/// and error event of that process.
pub trait ProcessCallbacks: Send + Sync {
    /// A classified event from stdout.
    fn on_data(&self, event: SemanticEvent);

    /// A stderr line or runtime error.
    fn on_error(&self, event: ErrorEvent);

    /// The process exited. `None` when it was killed by a signal.
    fn on_close(&self, exit_code: Option<i32>);
}

/// Event as seen through [`ChannelCallbacks`].
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Data(SemanticEvent),
    Error(ErrorEvent),
    Closed(Option<i32>),
}

/// Forwards every callback into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
    tx: UnboundedSender<SupervisorEvent>,
}

impl ChannelCallbacks {
    /// Create the callbacks and the receiving end.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create the callbacks with the receiver wrapped as a `Stream`.
    #[must_use]
    pub fn stream() -> (Self, UnboundedReceiverStream<SupervisorEvent>) {
        let (callbacks, rx) = Self::new();
        (callbacks, UnboundedReceiverStream::new(rx))
    }

    fn send(&self, event: SupervisorEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

impl ProcessCallbacks for ChannelCallbacks {
    fn on_data(&self, event: SemanticEvent) {
        self.send(SupervisorEvent::Data(event));
    }

    fn on_error(&self, event: ErrorEvent) {
        self.send(SupervisorEvent::Error(event));
    }

    fn on_close(&self, exit_code: Option<i32>) {
        self.send(SupervisorEvent::Closed(exit_code));
    }
}
