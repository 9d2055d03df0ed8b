mod config;
mod database;
mod forecast;
mod models;
mod peripherals;
mod radio;
mod sampling;
mod storage;
mod upload;
mod utils;

#[cfg(test)]
mod testing;

use log::{error, info};

use config::StationConfig;
use database::PgSession;
use forecast::Forecaster;
use peripherals::{IioPressureSensor, SystemClock, TcpLink};
use radio::HexFrameRadio;
use sampling::controller::Peripherals;
use sampling::{SamplingController, SamplingSettings};
use storage::RingBuffer;
use upload::{UploadCoordinator, UploadSettings};

async fn main_loop(config: StationConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Bresser weather station service");

    let radio = match HexFrameRadio::open(&config.frame_source, config.receive_timeout).await {
        Ok(radio) => radio,
        Err(e) => {
            error!(
                "Radio initialisation failed on {}: {}",
                config.frame_source.display(),
                e
            );
            return Err(e.into());
        }
    };

    let pressure = IioPressureSensor::new(config.pressure_sensor_path.clone());
    let link = TcpLink::from_database_url(&config.database_url)?;
    let clock = SystemClock::new(config.utc_offset);

    let buffer = match &config.buffer_path {
        Some(path) => RingBuffer::open(path.clone(), config.buffer_capacity),
        None => RingBuffer::in_memory(config.buffer_capacity),
    };

    let uploader = UploadCoordinator::new(
        PgSession::new(config.database_url.clone(), config.weather_table.clone()),
        UploadSettings::for_interval(config.interval_minutes),
    );
    let forecaster = Forecaster::new(config.zambretti, config.altitude_m, config.hemisphere);

    let mut controller = SamplingController::new(
        Peripherals {
            radio,
            pressure,
            link,
            clock,
        },
        buffer,
        uploader,
        forecaster,
        SamplingSettings::with_interval(config.interval_minutes),
    );
    if let Some(path) = config.schedule_path {
        controller = controller.with_schedule_store(path);
    }
    controller.run().await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    // Run the station or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            if let Err(e) = result {
                error!("Fatal error: {}", e);
                return Err(e);
            }
        }
        _ = &mut rx => {
            info!("Station stopped by user. Exiting gracefully.");
        }
    }

    Ok(())
}
