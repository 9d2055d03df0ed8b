pub mod coordinator;
pub mod record;

pub use coordinator::{UploadCoordinator, UploadSettings};
pub use record::DeliveryRecord;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("network link not available")]
    ConnectivityTimeout,
    #[error("delivery credential not ready")]
    CredentialNotReady,
    #[error("delivery failed after {sent} item(s)")]
    DeliveryFailure { sent: usize },
}

/// Access token (or session) needed before records can be delivered.
pub trait Credential {
    fn is_token_valid(&self) -> bool;
    /// Start acquiring a credential that lapses after `expiry`. Completion is
    /// observed through `is_token_valid`.
    fn request_token(&mut self, expiry: Duration);
}

/// Remote destination for delivery records.
#[allow(async_fn_in_trait)]
pub trait DeliveryChannel {
    async fn submit(&mut self, record: &DeliveryRecord) -> bool;
}
