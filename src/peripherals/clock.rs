use log::debug;
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::peripherals::Clock;

/// Anything earlier than three weeks after the epoch is an unset RTC.
const SYNCED_AFTER_SECS: i64 = 21 * 24 * 60 * 60;

/// System time shifted into the station's configured local offset
///
/// The offset is fixed at startup since the local offset cannot be queried
/// reliably once the runtime has spawned worker threads.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let local = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(local.date(), local.time())
    }

    fn is_synchronized(&self) -> bool {
        OffsetDateTime::now_utc().unix_timestamp() >= SYNCED_AFTER_SECS
    }

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn suspend(&self, duration: Duration) {
        debug!("Suspending for {} second(s)", duration.as_secs());
        tokio::time::sleep(duration).await;
    }
}
