use log::{info, warn};
use std::path::PathBuf;

use crate::peripherals::PressureSensor;

const KPA_TO_HPA: f32 = 10.0;

/// BMP280-class barometer exposed by the Linux IIO subsystem
///
/// The kernel driver publishes `in_pressure_input` in kPa; a missing path
/// means no barometer is fitted and pressure is reported as 0.
#[derive(Debug, Clone, Default)]
pub struct IioPressureSensor {
    path: Option<PathBuf>,
}

impl IioPressureSensor {
    pub fn new(path: Option<PathBuf>) -> Self {
        match &path {
            Some(p) => info!("Pressure sensor at {}", p.display()),
            None => info!("Pressure sensor unavailable - pressure will read as 0"),
        }
        Self { path }
    }
}

impl PressureSensor for IioPressureSensor {
    fn available(&self) -> bool {
        self.path.is_some()
    }

    async fn read_hpa(&mut self) -> Option<f32> {
        let path = self.path.as_ref()?;
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read pressure from {}: {}", path.display(), e);
                return None;
            }
        };
        match text.trim().parse::<f32>() {
            Ok(kpa) => Some(kpa * KPA_TO_HPA),
            Err(e) => {
                warn!("Unparseable pressure value {:?}: {}", text.trim(), e);
                None
            }
        }
    }
}
