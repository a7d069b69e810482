use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

pub const SETTINGS_PATH_ENV: &str = "SOS_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "sos-settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyContact {
    pub number: String,
    pub label: String,
}

impl EmergencyContact {
    fn new(number: &str, label: &str) -> Self {
        Self {
            number: number.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_ms: u64,
    pub safe_location_radius_m: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            auth_token: None,
            request_timeout_ms: 10_000,
            safe_location_radius_m: 5_000,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Inputs for the console binary's device implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub ffmpeg_path: String,
    pub video_format: String,
    pub video_input: String,
    pub audio_format: String,
    pub audio_input: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            accuracy_meters: None,
            ffmpeg_path: "ffmpeg".into(),
            video_format: "v4l2".into(),
            video_input: "/dev/video0".into(),
            audio_format: "alsa".into(),
            audio_input: "default".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub countdown_ticks: u8,
    pub tick_interval_ms: u64,
    pub location_timeout_ms: u64,
    pub segment_duration_ms: u64,
    pub min_segment_bytes: usize,
    pub poll_interval_ms: u64,
    pub upload_drain_timeout_ms: u64,
    pub emergency_type: String,
    pub description: String,
    pub fallback_contacts: Vec<EmergencyContact>,
    pub backend: BackendSettings,
    pub device: DeviceSettings,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            tick_interval_ms: 1_000,
            location_timeout_ms: 10_000,
            segment_duration_ms: 10_000,
            min_segment_bytes: 1_000,
            poll_interval_ms: 10_000,
            upload_drain_timeout_ms: 10_000,
            emergency_type: "general_emergency".into(),
            description: "Emergency assistance needed".into(),
            fallback_contacts: vec![
                EmergencyContact::new("112", "Emergency"),
                EmergencyContact::new("100", "Police"),
                EmergencyContact::new("108", "Ambulance"),
                EmergencyContact::new("101", "Fire"),
            ],
            backend: BackendSettings::default(),
            device: DeviceSettings::default(),
        }
    }
}

impl CoordinatorSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_millis(self.segment_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn upload_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_drain_timeout_ms)
    }

    /// Rejects periods the timers cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tick_interval_ms", self.tick_interval_ms),
            ("location_timeout_ms", self.location_timeout_ms),
            ("segment_duration_ms", self.segment_duration_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
        ] {
            ensure!(value > 0, "{name} must be greater than zero");
        }
        Ok(())
    }

    /// First contact offered when activation fails.
    pub fn primary_contact(&self) -> Option<&EmergencyContact> {
        self.fallback_contacts.first()
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CoordinatorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<CoordinatorSettings>(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            CoordinatorSettings::default()
        };
        data.validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Resolves the path from `SOS_SETTINGS`, falling back to the working directory.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn coordinator(&self) -> CoordinatorSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update_device(&self, device: DeviceSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.device = device;
        self.persist(&guard)
    }

    fn persist(&self, data: &CoordinatorSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sos-settings-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::new(temp_path("missing")).unwrap();
        let settings = store.coordinator();
        assert_eq!(settings.countdown_ticks, 5);
        assert_eq!(settings.location_timeout(), Duration::from_secs(10));
        assert_eq!(settings.segment_duration(), Duration::from_secs(10));
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.primary_contact().unwrap().number, "112");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"poll_interval_ms": 2500, "backend": {"base_url": "https://sos.example"}}"#)
            .unwrap();

        let settings = SettingsStore::new(path.clone()).unwrap().coordinator();
        assert_eq!(settings.poll_interval(), Duration::from_millis(2500));
        assert_eq!(settings.backend.base_url, "https://sos.example");
        assert_eq!(settings.backend.safe_location_radius_m, 5_000);
        assert_eq!(settings.min_segment_bytes, 1_000);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn zero_timer_periods_are_rejected() {
        for field in ["tick_interval_ms", "poll_interval_ms", "segment_duration_ms"] {
            let path = temp_path("zero");
            fs::write(&path, format!(r#"{{"{field}": 0}}"#)).unwrap();

            let err = SettingsStore::new(path.clone()).err().unwrap();
            let message = format!("{err:#}");
            assert!(message.contains("Invalid settings"), "{message}");
            assert!(message.contains(field), "{message}");

            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn device_updates_are_persisted() {
        let path = temp_path("persist");
        let store = SettingsStore::new(path.clone()).unwrap();
        let mut device = store.coordinator().device;
        device.latitude = 12.97;
        device.longitude = 77.59;
        store.update_device(device).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap().coordinator();
        assert_eq!(reloaded.device.latitude, 12.97);
        assert_eq!(reloaded.device.longitude, 77.59);

        let _ = fs::remove_file(path);
    }
}
