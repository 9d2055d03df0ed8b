/// Simulated collaborators for unit tests
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Duration;
use time::PrimitiveDateTime;

use crate::peripherals::{Clock, Connectivity, PressureSensor};
use crate::radio::{Radio, RawFrame, Reception, FRAME_LEN, SYNC_BYTE};
use crate::upload::{Credential, DeliveryChannel, DeliveryRecord};

pub const EXAMPLE_PAYLOAD: [u8; FRAME_LEN - 1] = [
    0xEA, 0xEC, 0x7F, 0xEB, 0x5F, 0xEE, 0xEF, 0xFA, 0xFE, 0x76, 0xBB, 0xFA, 0xFF, 0x15, 0x13, 0x80,
    0x14, 0xA0, 0x11, 0x10, 0x05, 0x01, 0x89, 0x44, 0x05, 0x00,
];

pub fn example_frame() -> RawFrame {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = SYNC_BYTE;
    frame[1..].copy_from_slice(&EXAMPLE_PAYLOAD);
    frame
}

/// Clock whose waits only move simulated time forward.
pub struct SimClock {
    start: PrimitiveDateTime,
    now: Cell<PrimitiveDateTime>,
    synchronized: Cell<bool>,
    suspended: Cell<Duration>,
}

impl SimClock {
    pub fn new(now: PrimitiveDateTime) -> Self {
        Self {
            start: now,
            now: Cell::new(now),
            synchronized: Cell::new(true),
            suspended: Cell::new(Duration::ZERO),
        }
    }

    pub fn set(&self, now: PrimitiveDateTime) {
        self.now.set(now);
    }

    pub fn set_synchronized(&self, synchronized: bool) {
        self.synchronized.set(synchronized);
    }

    /// Simulated time passed since construction.
    pub fn elapsed(&self) -> Duration {
        (self.now.get() - self.start).unsigned_abs()
    }

    /// Total time spent in low-power sleep.
    pub fn suspended(&self) -> Duration {
        self.suspended.get()
    }
}

impl Clock for SimClock {
    fn now(&self) -> PrimitiveDateTime {
        self.now.get()
    }

    fn is_synchronized(&self) -> bool {
        self.synchronized.get()
    }

    async fn delay(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    async fn suspend(&self, duration: Duration) {
        self.suspended.set(self.suspended.get() + duration);
        self.now.set(self.now.get() + duration);
    }
}

#[derive(Default)]
pub struct FakeLink {
    pub connected: bool,
    pub probes: Cell<u32>,
    pub disconnects: u32,
}

impl FakeLink {
    pub fn up() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn down() -> Self {
        Self::default()
    }
}

impl Connectivity for FakeLink {
    async fn is_connected(&self) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.connected
    }

    /// The simulated link comes straight back on the next probe.
    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

/// Delivery endpoint recording what it was sent.
#[derive(Default)]
pub struct FakeSheet {
    pub token_valid: bool,
    pub grant_on_request: bool,
    pub token_requests: Vec<Duration>,
    pub delivered: Vec<DeliveryRecord>,
    /// Reject the submission with this zero-based index.
    pub fail_at: Option<usize>,
}

impl FakeSheet {
    pub fn ready() -> Self {
        Self {
            token_valid: true,
            ..Default::default()
        }
    }

    pub fn granting() -> Self {
        Self {
            grant_on_request: true,
            ..Default::default()
        }
    }
}

impl Credential for FakeSheet {
    fn is_token_valid(&self) -> bool {
        self.token_valid
    }

    fn request_token(&mut self, expiry: Duration) {
        self.token_requests.push(expiry);
        if self.grant_on_request {
            self.token_valid = true;
        }
    }
}

impl DeliveryChannel for FakeSheet {
    async fn submit(&mut self, record: &DeliveryRecord) -> bool {
        if self.fail_at == Some(self.delivered.len()) {
            return false;
        }
        self.delivered.push(record.clone());
        true
    }
}

pub enum Scripted {
    Frame(RawFrame),
    Timeout,
    Failed(i32),
}

/// Radio replaying a fixed script, then timing out forever.
#[derive(Default)]
pub struct ScriptedRadio {
    script: VecDeque<Scripted>,
}

impl ScriptedRadio {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl Radio for ScriptedRadio {
    async fn receive(&mut self, frame: &mut RawFrame) -> Reception {
        match self.script.pop_front() {
            Some(Scripted::Frame(bytes)) => {
                *frame = bytes;
                Reception::Received
            }
            Some(Scripted::Failed(code)) => Reception::Failed(code),
            Some(Scripted::Timeout) | None => Reception::Timeout,
        }
    }
}

/// Barometer returning a constant, or absent.
pub struct FixedPressure(pub Option<f32>);

impl PressureSensor for FixedPressure {
    fn available(&self) -> bool {
        self.0.is_some()
    }

    async fn read_hpa(&mut self) -> Option<f32> {
        self.0
    }
}
