//! Progress reporting for long-running operations

use crate::error::Error;
use async_trait::async_trait;

/// Receives progress events from the reconciler and the land sequencer
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A stack slot is about to be processed
    async fn on_slot_start(&self, position: usize, summary: &str);

    /// A step completed successfully
    async fn on_step_done(&self, position: usize, description: &str);

    /// A slot failed; later slots still run
    async fn on_slot_error(&self, position: usize, error: &Error);

    /// Free-form status line
    async fn on_message(&self, message: &str);
}

/// Progress callback that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_slot_start(&self, _position: usize, _summary: &str) {}
    async fn on_step_done(&self, _position: usize, _description: &str) {}
    async fn on_slot_error(&self, _position: usize, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
}
