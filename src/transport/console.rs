//! JSON-lines console transport
//!
//! A development adapter that stands in for the real messaging platform:
//! inbound events are read as JSON lines from stdin, outbound deliveries are
//! written as JSON lines to stdout. One event per line.

use crate::gateway::Gateway;
use crate::transport::{
    ChatTransport, InboundEvent, KeyboardHint, MessageRef, PaymentReview, TransportError,
};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Transport adapter that prints deliveries to stdout
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, frame: serde_json::Value) -> Result<(), TransportError> {
        let line = frame.to_string();
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line).map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_text(
        &self,
        to: i64,
        text: &str,
        keyboard: KeyboardHint,
    ) -> Result<(), TransportError> {
        self.emit(serde_json::json!({
            "event": "send_text",
            "to": to,
            "text": text,
            "keyboard": keyboard,
        }))
    }

    async fn copy_message(&self, message: &MessageRef, to: i64) -> Result<(), TransportError> {
        self.emit(serde_json::json!({
            "event": "copy_message",
            "message": message,
            "to": to,
        }))
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.emit(serde_json::json!({
            "event": "delete_message",
            "message": message,
        }))
    }

    async fn send_payment_review(
        &self,
        admin_id: i64,
        review: &PaymentReview,
    ) -> Result<(), TransportError> {
        self.emit(serde_json::json!({
            "event": "payment_review",
            "to": admin_id,
            "review": review,
        }))
    }
}

/// Feed stdin events through the gateway until stdin closes
pub async fn serve(gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => gateway.handle_event(event).await,
            Err(err) => warn!("Ignoring malformed event: {}", err),
        }
    }

    Ok(())
}
