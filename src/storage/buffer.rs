/// Bounded reading queue with peek/confirm reads and optional file persistence
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::models::BufferEntry;
use crate::storage::{EntryHandle, ReadingBuffer};

/// 20 days of readings at 6 an hour.
pub const DEFAULT_CAPACITY: usize = 20 * 6 * 24;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("buffer file format: {0}")]
    Format(#[from] serde_json::Error),
}

/// The rain gauge reports a running total; entries store the total since the
/// first reading of the day instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DailyRain {
    day: i32,
    start_mm: f32,
}

impl DailyRain {
    fn since_start_of_day(&mut self, captured_at: PrimitiveDateTime, total_mm: f32) -> f32 {
        let date = captured_at.date();
        let day = date.year() * 10_000 + i32::from(u8::from(date.month())) * 100 + i32::from(date.day());
        // A counter lower than the baseline means the outdoor unit was reset
        if day != self.day || total_mm < self.start_mm {
            self.day = day;
            self.start_mm = total_mm;
            info!("Resetting rain for {} relative to {:.2} mm", day, total_mm);
        }
        total_mm - self.start_mm
    }
}

#[derive(Serialize, Deserialize)]
struct Stored {
    head: u64,
    rain: DailyRain,
    entries: VecDeque<BufferEntry>,
}

/// Circular buffer of captured readings
///
/// `head` is the sequence number of the oldest entry. Peek hands it out as the
/// entry handle, so a confirm for anything but the current oldest entry is a
/// no-op. When full, appending drops the oldest entry.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    head: u64,
    rain: DailyRain,
    entries: VecDeque<BufferEntry>,
    store: Option<PathBuf>,
}

impl RingBuffer {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            head: 0,
            rain: DailyRain::default(),
            entries: VecDeque::new(),
            store: None,
        }
    }

    /// Open a file-backed buffer, recovering whatever the file holds
    ///
    /// A missing file starts an empty buffer. An unreadable one is logged and
    /// replaced on the next write, since the station must keep sampling.
    pub fn open(path: PathBuf, capacity: usize) -> Self {
        let mut buffer = Self::in_memory(capacity);
        match load(&path) {
            Ok(stored) => {
                buffer.head = stored.head;
                buffer.rain = stored.rain;
                buffer.entries = stored.entries;
                while buffer.entries.len() > buffer.capacity {
                    buffer.entries.pop_front();
                    buffer.head += 1;
                }
                info!(
                    "Recovered {} buffered reading(s) from {}",
                    buffer.entries.len(),
                    path.display()
                );
            }
            Err(BufferError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                info!("Starting new reading buffer at {}", path.display());
            }
            Err(e) => {
                error!("Discarding unreadable buffer {}: {}", path.display(), e);
            }
        }
        buffer.store = Some(path);
        buffer
    }

    fn persist(&self) {
        if let Some(path) = &self.store {
            if let Err(e) = self.save(path) {
                error!("Failed to persist reading buffer: {}", e);
            }
        }
    }

    fn save(&self, path: &Path) -> Result<(), BufferError> {
        let stored = Stored {
            head: self.head,
            rain: self.rain.clone(),
            entries: self.entries.clone(),
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&stored)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<Stored, BufferError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl ReadingBuffer for RingBuffer {
    fn append(&mut self, mut entry: BufferEntry) {
        if self.entries.len() >= self.capacity {
            warn!("Reading buffer full - dropping oldest entry");
            self.entries.pop_front();
            self.head += 1;
        }
        entry.reading.rain_mm = self
            .rain
            .since_start_of_day(entry.captured_at, entry.reading.rain_mm);
        self.entries.push_back(entry);
        self.persist();
    }

    fn peek_oldest(&self) -> Option<(EntryHandle, BufferEntry)> {
        self.entries
            .front()
            .map(|entry| (EntryHandle(self.head), entry.clone()))
    }

    fn confirm_removed(&mut self, handle: EntryHandle) {
        if handle.0 != self.head || self.entries.is_empty() {
            debug!("Ignoring confirm for stale entry {}", handle.0);
            return;
        }
        self.entries.pop_front();
        self.head += 1;
        self.persist();
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}
