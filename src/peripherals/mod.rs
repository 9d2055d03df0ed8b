pub mod clock;
pub mod link;
pub mod pressure;

pub use clock::SystemClock;
pub use link::TcpLink;
pub use pressure::IioPressureSensor;

use std::time::Duration;
use time::PrimitiveDateTime;

/// Wall clock plus the two ways the control loop can wait on it.
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Current local calendar time.
    fn now(&self) -> PrimitiveDateTime;

    /// Whether the clock has been set from a time source since boot.
    fn is_synchronized(&self) -> bool;

    /// Short busy wait; the network link stays up.
    async fn delay(&self, duration: Duration);

    /// Low-power sleep until the timer fires.
    async fn suspend(&self, duration: Duration) {
        self.delay(duration).await
    }
}

/// Network link used for time sync and uploads.
#[allow(async_fn_in_trait)]
pub trait Connectivity {
    async fn is_connected(&self) -> bool;
    fn disconnect(&mut self);
}

/// Optional barometer.
#[allow(async_fn_in_trait)]
pub trait PressureSensor {
    fn available(&self) -> bool;
    async fn read_hpa(&mut self) -> Option<f32>;
}
