use std::str::FromStr;

use crate::models::{Alert, Location, ResolutionReport};

use super::{AlertLifecycleManager, AlertSnapshot};

pub const HELP: &str = "\
commands:
  sos                   start the emergency countdown
  cancel                cancel the countdown
  now                   send the alert immediately
  safe                  mark yourself safe and end the alert
  loc <lat> <lon> [acc] report a new position
  status                show the current state
  quit                  exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sos,
    Cancel,
    Now,
    Safe,
    Location(Location),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".into());
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "sos" => Command::Sos,
            "cancel" => Command::Cancel,
            "now" => Command::Now,
            "safe" => Command::Safe,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "loc" => {
                let latitude = parse_coordinate(parts.next(), "latitude")?;
                let longitude = parse_coordinate(parts.next(), "longitude")?;
                let accuracy = parts
                    .next()
                    .map(|raw| parse_coordinate(Some(raw), "accuracy"))
                    .transpose()?;
                Command::Location(Location::new(latitude, longitude, accuracy))
            }
            other => return Err(format!("unknown command `{other}`, try `help`")),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments for `{verb}`"));
        }
        Ok(command)
    }
}

fn parse_coordinate(raw: Option<&str>, name: &str) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("missing {name}"))?;
    raw.parse::<f64>()
        .map_err(|e| format!("invalid {name} `{raw}`: {e}"))
}

pub async fn start_countdown(manager: &AlertLifecycleManager) -> Result<u8, String> {
    if manager.begin_countdown(None).await {
        Ok(manager.settings().countdown_ticks)
    } else {
        Err("an emergency is already underway".into())
    }
}

pub async fn cancel_countdown(manager: &AlertLifecycleManager) -> Result<(), String> {
    if manager.cancel_countdown().await {
        Ok(())
    } else {
        Err("no countdown to cancel".into())
    }
}

pub async fn send_now(manager: &AlertLifecycleManager) -> Result<Option<Alert>, String> {
    manager.trigger(None).await.map_err(|e| e.to_string())
}

pub async fn mark_safe(manager: &AlertLifecycleManager) -> Result<ResolutionReport, String> {
    manager
        .deactivate()
        .await
        .ok_or_else(|| "no active alert".to_string())
}

pub async fn update_location(
    manager: &AlertLifecycleManager,
    location: Location,
) -> Result<(), String> {
    if manager.update_location(location).await {
        Ok(())
    } else {
        Err("location update was not delivered".into())
    }
}

pub fn get_status(manager: &AlertLifecycleManager) -> AlertSnapshot {
    manager.snapshot()
}

/// Runs one console command and renders its outcome.
pub async fn dispatch(manager: &AlertLifecycleManager, command: Command) -> Result<String, String> {
    match command {
        Command::Sos => start_countdown(manager)
            .await
            .map(|ticks| format!("countdown started: alert goes out in {ticks}s, `cancel` to stop")),
        Command::Cancel => cancel_countdown(manager)
            .await
            .map(|()| "countdown cancelled".to_string()),
        Command::Now => send_now(manager).await.map(|alert| match alert {
            Some(alert) => format!("alert {} is active", alert.id),
            None => "an emergency is already underway".to_string(),
        }),
        Command::Safe => mark_safe(manager).await.map(|report| {
            format!(
                "alert {} resolved after {}s ({} segment(s) uploaded)",
                report.alert_id,
                report.duration_ms / 1000,
                report.segments_uploaded
            )
        }),
        Command::Location(location) => update_location(manager, location)
            .await
            .map(|()| "location sent".to_string()),
        Command::Status => {
            let snapshot = get_status(manager);
            serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok("bye".to_string()),
    }
}
