/// Wake/capture/upload/sleep cycle of the weather station
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::forecast::{CompassPoint, Forecaster};
use crate::models::BufferEntry;
use crate::peripherals::{Clock, Connectivity, PressureSensor};
use crate::radio::{decode_frame, DecodeError, Radio, Reception, FRAME_LEN};
use crate::sampling::timeslot::{encode_target, next_slot, TargetWakeTime};
use crate::storage::ReadingBuffer;
use crate::upload::coordinator::MAX_ITEMS_PER_CYCLE;
use crate::upload::{Credential, DeliveryChannel, UploadCoordinator};
use crate::utils::{format_datetime, ms_to_mph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingState {
    InitialWifiConnection,
    ReinitWifiConnection,
    AwaitTimeSlot,
    CaptureWeatherData,
    SendWeatherData,
    SleepUntilTimeSlot,
}

/// Everything the controller needs to carry across a sleep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub state: SamplingState,
    pub reinit_attempts: u32,
    pub target_wake: TargetWakeTime,
    /// Set when the last cycle went to sleep, cleared once the link is back
    pub slept: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            state: SamplingState::InitialWifiConnection,
            reinit_attempts: 0,
            target_wake: TargetWakeTime::default(),
            slept: false,
        }
    }
}

impl Schedule {
    /// Read a schedule saved by a previous run. Unreadable files are logged
    /// and ignored.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Can't read schedule {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!("Ignoring corrupt schedule {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write through a temporary file so a crash never leaves half a schedule.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, path)
    }
}

/// What the run loop must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Busy wait with the link kept up
    Pause(Duration),
    /// Low-power sleep; the link has already been released
    Suspend(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingSettings {
    /// Readings are taken on multiples of this many minutes past the hour
    pub interval_minutes: u32,
    /// Shorter waits are spent awake
    pub min_sleep: Duration,
    pub reconnect_interval: Duration,
    pub reconnect_attempts: u32,
    /// Pause after reconnecting from sleep so the clock can resync
    pub time_sync_settle: Duration,
    pub slot_poll: Duration,
    pub upload_batch: usize,
}

impl SamplingSettings {
    pub fn with_interval(interval_minutes: u32) -> Self {
        Self {
            interval_minutes,
            min_sleep: Duration::from_secs(30),
            reconnect_interval: Duration::from_millis(500),
            reconnect_attempts: 40,
            time_sync_settle: Duration::from_secs(10),
            slot_poll: Duration::from_secs(2),
            upload_batch: MAX_ITEMS_PER_CYCLE,
        }
    }
}

pub struct Peripherals<R, P, L, C> {
    pub radio: R,
    pub pressure: P,
    pub link: L,
    pub clock: C,
}

/// Single-task state machine driving capture, upload and sleep
///
/// Each `tick` handles exactly one state and reports how long to wait before
/// the next one. The waits are applied by `run` through the clock, so state
/// transitions are complete before any sleep starts.
pub struct SamplingController<R, P, L, C, B, S> {
    radio: R,
    pressure: P,
    link: L,
    clock: C,
    buffer: B,
    uploader: UploadCoordinator<S>,
    forecaster: Forecaster,
    settings: SamplingSettings,
    schedule: Schedule,
    schedule_store: Option<PathBuf>,
}

impl<R, P, L, C, B, S> SamplingController<R, P, L, C, B, S>
where
    R: Radio,
    P: PressureSensor,
    L: Connectivity,
    C: Clock,
    B: ReadingBuffer,
    S: Credential + DeliveryChannel,
{
    pub fn new(
        peripherals: Peripherals<R, P, L, C>,
        buffer: B,
        uploader: UploadCoordinator<S>,
        forecaster: Forecaster,
        settings: SamplingSettings,
    ) -> Self {
        Self {
            radio: peripherals.radio,
            pressure: peripherals.pressure,
            link: peripherals.link,
            clock: peripherals.clock,
            buffer,
            uploader,
            forecaster,
            settings,
            schedule: Schedule::default(),
            schedule_store: None,
        }
    }

    /// Keep the schedule in `path` across restarts, resuming from it if a
    /// previous run left one behind.
    pub fn with_schedule_store(mut self, path: PathBuf) -> Self {
        if let Some(schedule) = Schedule::load(&path) {
            info!("Resuming schedule at {:?}", schedule.state);
            self.resume(schedule);
        }
        self.schedule_store = Some(path);
        self
    }

    pub fn state(&self) -> SamplingState {
        self.schedule.state
    }

    pub fn snapshot(&self) -> Schedule {
        self.schedule.clone()
    }

    pub fn resume(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    /// Run the cycle forever.
    pub async fn run(&mut self) {
        info!(
            "Sampling every {} minute(s), {} reading(s) buffered",
            self.settings.interval_minutes,
            self.buffer.count()
        );
        loop {
            let step = self.tick().await;
            self.apply(step).await;
        }
    }

    async fn apply(&self, step: Step) {
        match step {
            Step::Continue => {}
            Step::Pause(duration) => self.clock.delay(duration).await,
            Step::Suspend(duration) => {
                self.save_schedule();
                self.clock.suspend(duration).await
            }
        }
    }

    fn save_schedule(&self) {
        if let Some(path) = &self.schedule_store {
            if let Err(e) = self.snapshot().save(path) {
                warn!("Can't save schedule to {}: {}", path.display(), e);
            }
        }
    }

    /// Process the current state once.
    pub async fn tick(&mut self) -> Step {
        match self.schedule.state {
            SamplingState::InitialWifiConnection => self.initial_connection().await,
            SamplingState::ReinitWifiConnection => self.reinit_connection().await,
            SamplingState::AwaitTimeSlot => self.await_time_slot(),
            SamplingState::CaptureWeatherData => {
                if self.capture().await {
                    info!("Captured data - signalling sending");
                    self.transition(SamplingState::SendWeatherData);
                }
                Step::Continue
            }
            SamplingState::SendWeatherData => {
                info!("Attempting to send data...");
                self.uploader
                    .upload_pending(
                        &self.link,
                        &self.clock,
                        &mut self.buffer,
                        self.settings.upload_batch,
                    )
                    .await;
                self.transition(SamplingState::SleepUntilTimeSlot);
                Step::Continue
            }
            SamplingState::SleepUntilTimeSlot => self.sleep_until_time_slot(),
        }
    }

    fn transition(&mut self, next: SamplingState) {
        debug!("{:?} -> {:?}", self.state(), next);
        self.schedule.state = next;
    }

    async fn initial_connection(&mut self) -> Step {
        if self.link.is_connected().await {
            info!("Connected - OK");
            self.transition(SamplingState::SleepUntilTimeSlot);
            Step::Continue
        } else {
            Step::Pause(self.settings.reconnect_interval)
        }
    }

    async fn reinit_connection(&mut self) -> Step {
        if self.link.is_connected().await {
            self.transition(SamplingState::CaptureWeatherData);
            if std::mem::take(&mut self.schedule.slept) {
                info!("Connected - OK - waiting a few seconds for time sync");
                return Step::Pause(self.settings.time_sync_settle);
            }
            return Step::Continue;
        }

        if self.schedule.reinit_attempts < self.settings.reconnect_attempts {
            self.schedule.reinit_attempts += 1;
            trace!("Reconnect attempt {}", self.schedule.reinit_attempts);
            return Step::Pause(self.settings.reconnect_interval);
        }

        if self.clock.is_synchronized() {
            warn!("Cannot connect but time synced - so continuing");
            self.transition(SamplingState::AwaitTimeSlot);
        } else {
            warn!("Cannot connect and time not synced - waiting for the link as times would be wrong");
            self.transition(SamplingState::SleepUntilTimeSlot);
        }
        Step::Continue
    }

    fn await_time_slot(&mut self) -> Step {
        let current = encode_target(self.clock.now(), 0);
        if current >= self.schedule.target_wake {
            info!("Reached time to capture data");
            self.transition(SamplingState::CaptureWeatherData);
            Step::Continue
        } else {
            debug!(
                "Awaiting time to capture data want: [{}] got: [{}]",
                self.schedule.target_wake.0, current.0
            );
            Step::Pause(self.settings.slot_poll)
        }
    }

    fn sleep_until_time_slot(&mut self) -> Step {
        let plan = next_slot(self.clock.now(), self.settings.interval_minutes);
        self.schedule.target_wake = plan.target;
        let wait = Duration::from_secs(u64::from(plan.seconds_to_wait));

        if wait < self.settings.min_sleep {
            self.transition(SamplingState::AwaitTimeSlot);
            return Step::Continue;
        }

        info!(
            "Sleeping for {} second(s) (~{} minute(s)) until time slot [{}]",
            plan.seconds_to_wait, plan.minutes_to_wait, plan.target.0
        );
        self.schedule.reinit_attempts = 0;
        self.schedule.slept = true;
        self.link.disconnect();
        self.transition(SamplingState::ReinitWifiConnection);
        Step::Suspend(wait)
    }

    /// Receive one frame and buffer it if it decodes
    async fn capture(&mut self) -> bool {
        let mut frame = [0u8; FRAME_LEN];
        match self.radio.receive(&mut frame).await {
            Reception::Received => {}
            Reception::Timeout => {
                trace!("Receive timed out");
                return false;
            }
            Reception::Failed(code) => {
                error!("Receive failed, code {}", code);
                return false;
            }
        }

        let mut reading = match decode_frame(&frame) {
            Ok(reading) => reading,
            Err(DecodeError::SyncMismatch(byte)) => {
                debug!("Ignoring unaligned frame starting {:#04x}", byte);
                return false;
            }
            Err(e) => {
                warn!("Discarding frame: {}", e);
                return false;
            }
        };

        if self.pressure.available() {
            if let Some(hpa) = self.pressure.read_hpa().await {
                reading.pressure_hpa = hpa;
            }
        }

        let captured_at = self.clock.now();
        info!(
            "[{}] [Bresser-5in1 ({})] Batt: [{}] Temp: [{:.1}C] Hum: [{}] WGust: [{:.1} mph] WSpeed: [{:.1} mph] WDir: [{:.1} {}] Rain: [{:.1} mm] Pressure: [{:.1} hPa]",
            format_datetime(&captured_at),
            reading.sensor_id,
            if reading.battery_low { "Low" } else { "OK" },
            reading.temperature_c,
            reading.humidity,
            ms_to_mph(reading.wind_gust_ms),
            ms_to_mph(reading.wind_avg_ms),
            reading.wind_direction_deg,
            CompassPoint::from_degrees(reading.wind_direction_deg),
            reading.rain_mm,
            reading.pressure_hpa
        );

        if let Some(forecast) = self.forecaster.observe(&reading, u8::from(captured_at.month())) {
            info!(
                "Forecast ({:?} pressure): {}{}",
                self.forecaster.trend(),
                if forecast.extreme { "extreme - " } else { "" },
                forecast.text
            );
        }

        self.buffer.append(BufferEntry {
            captured_at,
            reading,
        });
        true
    }
}
