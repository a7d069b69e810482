pub mod alert;
pub mod backend;
pub mod capture;
pub mod device;
pub mod error;
pub mod guard;
pub mod models;
pub mod resolution;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};

use alert::{
    commands::{self, Command},
    AlertEvent, AlertLifecycleManager,
};
use backend::HttpBackend;
use device::{FfmpegCamera, StaticLocationSource};
use settings::SettingsStore;

pub use error::AlertError;

/// Console front end: reads commands from stdin and prints alert events
/// until `quit` or end of input.
pub async fn run() -> Result<()> {
    utils::init_logging();

    let store = SettingsStore::from_env()?;
    let settings = store.coordinator();
    info!("settings loaded from {}", store.path().display());

    let backend = HttpBackend::new(&settings.backend).context("failed to build backend client")?;
    let location = StaticLocationSource::new(
        settings.device.latitude,
        settings.device.longitude,
        settings.device.accuracy_meters,
    );
    let camera = FfmpegCamera::new(settings.device.clone());
    let manager = AlertLifecycleManager::new(
        settings,
        Arc::new(backend),
        Arc::new(location),
        Arc::new(camera),
    );

    let printer = tokio::spawn(print_events(manager.subscribe_events()));

    println!("{}", commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let remembered = match &command {
            Command::Location(location) => Some(*location),
            _ => None,
        };
        let quit = command == Command::Quit;

        match commands::dispatch(&manager, command).await {
            Ok(output) => {
                println!("{output}");
                if let Some(location) = remembered {
                    remember_position(&store, location);
                }
            }
            Err(message) => println!("{message}"),
        }

        if quit {
            break;
        }
    }

    manager.shutdown().await;
    printer.abort();
    Ok(())
}

/// Keeps the last reported position as the fix for the next activation.
fn remember_position(store: &SettingsStore, location: models::Location) {
    let mut device = store.coordinator().device;
    device.latitude = location.latitude;
    device.longitude = location.longitude;
    device.accuracy_meters = location.accuracy_meters;
    if let Err(err) = store.update_device(device) {
        warn!("failed to persist last position: {err:?}");
    }
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<AlertEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match event {
                AlertEvent::CountdownTick { remaining } => println!("sending in {remaining}..."),
                AlertEvent::ActivationFailed {
                    message,
                    fallback: Some(contact),
                } => println!(
                    "alert could not be sent ({message}). call {} ({}) now",
                    contact.number, contact.label
                ),
                other => match serde_json::to_string(&other) {
                    Ok(json) => println!("{json}"),
                    Err(err) => warn!("unprintable event: {err}"),
                },
            },
            Err(RecvError::Lagged(missed)) => warn!("event printer skipped {missed} event(s)"),
            Err(RecvError::Closed) => break,
        }
    }
}
