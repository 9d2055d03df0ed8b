/// Batched delivery of buffered readings
use log::{debug, info, warn};
use std::time::Duration;

use crate::peripherals::{Clock, Connectivity};
use crate::sampling::retry::RetryPolicy;
use crate::storage::ReadingBuffer;
use crate::upload::{Credential, DeliveryChannel, DeliveryRecord, UploadError};

/// Entries sent per wake: two hours of backlog at one reading per 10 minutes.
pub const MAX_ITEMS_PER_CYCLE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Waiting for the link, about 30 s
    pub link: RetryPolicy,
    /// Waiting for a requested credential, about 30 s
    pub token: RetryPolicy,
    /// Lifetime requested for a new credential
    pub token_expiry: Duration,
    /// Gap between consecutive deliveries
    pub pacing: Duration,
}

impl UploadSettings {
    /// Settings for a given sampling interval. The credential is requested to
    /// lapse half a minute after the next wake so each cycle starts fresh.
    pub fn for_interval(interval_minutes: u32) -> Self {
        Self {
            link: RetryPolicy::new(Duration::from_millis(250), 120),
            token: RetryPolicy::new(Duration::from_millis(500), 60),
            token_expiry: Duration::from_secs(u64::from(interval_minutes) * 60 + 30),
            pacing: Duration::from_millis(250),
        }
    }
}

/// Drains the reading buffer through a delivery channel
///
/// Entries leave the buffer only after the channel accepted them, and a
/// rejected entry ends the batch so rows are never delivered out of order.
pub struct UploadCoordinator<S> {
    sink: S,
    settings: UploadSettings,
}

impl<S> UploadCoordinator<S>
where
    S: Credential + DeliveryChannel,
{
    pub fn new(sink: S, settings: UploadSettings) -> Self {
        Self { sink, settings }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Deliver up to `max_items` buffered entries
    ///
    /// # Returns
    /// Number of entries delivered and removed from the buffer. Zero is normal
    /// for an empty buffer; failures are logged here and retried next wake.
    pub async fn upload_pending<L, C, B>(
        &mut self,
        link: &L,
        clock: &C,
        buffer: &mut B,
        max_items: usize,
    ) -> usize
    where
        L: Connectivity,
        C: Clock,
        B: ReadingBuffer,
    {
        match self.try_upload(link, clock, buffer, max_items).await {
            Ok(sent) => {
                if sent > 0 {
                    info!("Uploaded {} item(s), {} remaining", sent, buffer.count());
                } else {
                    debug!("Nothing to upload");
                }
                sent
            }
            Err(UploadError::DeliveryFailure { sent }) => {
                warn!(
                    "Delivery failed after {} item(s) - {} left for next cycle",
                    sent,
                    buffer.count()
                );
                sent
            }
            Err(e) => {
                warn!("Can't upload items: {}", e);
                0
            }
        }
    }

    async fn try_upload<L, C, B>(
        &mut self,
        link: &L,
        clock: &C,
        buffer: &mut B,
        max_items: usize,
    ) -> Result<usize, UploadError>
    where
        L: Connectivity,
        C: Clock,
        B: ReadingBuffer,
    {
        self.settings
            .link
            .poll_until(clock, move || link.is_connected(), UploadError::ConnectivityTimeout)
            .await?;

        if !self.sink.is_token_valid() {
            info!("Requesting delivery credential");
            self.sink.request_token(self.settings.token_expiry);
        }
        let sink = &self.sink;
        self.settings
            .token
            .poll_until(
                clock,
                move || std::future::ready(sink.is_token_valid()),
                UploadError::CredentialNotReady,
            )
            .await?;

        info!("{} item(s) to upload", buffer.count());
        let mut sent = 0;
        while sent < max_items {
            let Some((handle, entry)) = buffer.peek_oldest() else {
                break;
            };
            let record = DeliveryRecord::from_entry(&entry);
            if !self.sink.submit(&record).await {
                return Err(UploadError::DeliveryFailure { sent });
            }
            buffer.confirm_removed(handle);
            sent += 1;
            clock.delay(self.settings.pacing).await;
        }
        Ok(sent)
    }
}
