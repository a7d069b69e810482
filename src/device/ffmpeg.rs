use std::{io::ErrorKind, process::Stdio, sync::Arc};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::Command,
    time::{self, Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use super::media::{MediaDevice, MediaStream, RecordedClip};
use crate::{error::MediaError, settings::DeviceSettings};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const READ_CHUNK_BYTES: usize = 64 * 1024;
/// How long ffmpeg gets to finalize the container after a stop request.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Camera/microphone capture through an `ffmpeg` child process per segment,
/// encoded as WebM (VP8 + Opus) on stdout.
#[derive(Debug, Clone)]
pub struct FfmpegCamera {
    settings: DeviceSettings,
}

impl FfmpegCamera {
    pub fn new(settings: DeviceSettings) -> Self {
        Self { settings }
    }

    async fn check_input(&self) -> Result<(), MediaError> {
        if !self.settings.video_input.starts_with("/dev/") {
            return Ok(());
        }

        match tokio::fs::File::open(&self.settings.video_input).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                Err(MediaError::PermissionDenied)
            }
            Err(err) => Err(MediaError::DeviceUnavailable(format!(
                "{}: {err}",
                self.settings.video_input
            ))),
        }
    }

    async fn check_encoder(&self) -> Result<(), MediaError> {
        let status = Command::new(&self.settings.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| {
                MediaError::DeviceUnavailable(format!("{}: {err}", self.settings.ffmpeg_path))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::DeviceUnavailable(format!(
                "{} -version exited with {status}",
                self.settings.ffmpeg_path
            )))
        }
    }
}

#[async_trait]
impl MediaDevice for FfmpegCamera {
    async fn open(&self) -> Result<Arc<dyn MediaStream>, MediaError> {
        self.check_input().await?;
        self.check_encoder().await?;

        Ok(Arc::new(FfmpegStream {
            settings: self.settings.clone(),
            stop: CancellationToken::new(),
        }))
    }
}

struct FfmpegStream {
    settings: DeviceSettings,
    stop: CancellationToken,
}

impl FfmpegStream {
    fn command(&self, max: Duration) -> Command {
        let mut cmd = Command::new(&self.settings.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostats"])
            .args([
                "-f",
                self.settings.video_format.as_str(),
                "-i",
                self.settings.video_input.as_str(),
            ]);

        if !self.settings.audio_input.is_empty() {
            cmd.args([
                "-f",
                self.settings.audio_format.as_str(),
                "-i",
                self.settings.audio_input.as_str(),
            ]);
        }

        let limit = format!("{:.3}", max.as_secs_f64());
        cmd.args(["-t", limit.as_str()])
            .args(["-c:v", "libvpx", "-deadline", "realtime", "-b:v", "1M"])
            .args(["-c:a", "libopus"])
            .args(["-f", "webm", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaStream for FfmpegStream {
    async fn record_segment(&self, max: Duration) -> Result<RecordedClip, MediaError> {
        if self.stop.is_cancelled() {
            return Err(MediaError::Stopped);
        }

        let started = Instant::now();
        let mut child = self
            .command(max)
            .spawn()
            .map_err(|err| MediaError::Recording(format!("failed to spawn ffmpeg: {err}")))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Recording("ffmpeg stdout unavailable".into()))?;
        let mut stdin = child.stdin.take();

        let mut payload = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let mut stopping = false;
        let grace = time::sleep(STOP_GRACE);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                read = stdout.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => payload.extend_from_slice(&buf[..n]),
                    Err(err) => {
                        let _ = child.start_kill();
                        return Err(MediaError::Recording(format!("reading ffmpeg output: {err}")));
                    }
                },
                _ = self.stop.cancelled(), if !stopping => {
                    stopping = true;
                    grace.as_mut().reset(Instant::now() + STOP_GRACE);
                    // `q` makes ffmpeg flush and close the container cleanly.
                    if let Some(mut input) = stdin.take() {
                        let _ = input.write_all(b"q").await;
                    }
                }
                _ = &mut grace, if stopping => {
                    log_warn!("ffmpeg did not finish within {:?} of stop, killing", STOP_GRACE);
                    let _ = child.start_kill();
                    break;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| MediaError::Recording(format!("waiting for ffmpeg: {err}")))?;
        if !status.success() && payload.is_empty() && !stopping {
            return Err(MediaError::Recording(format!("ffmpeg exited with {status}")));
        }

        let duration = started.elapsed();
        log_debug!(
            "ffmpeg segment finished: {} bytes in {}ms",
            payload.len(),
            duration.as_millis()
        );
        Ok(RecordedClip { payload, duration })
    }

    fn stop_tracks(&self) {
        self.stop.cancel();
    }

    fn is_live(&self) -> bool {
        !self.stop.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DeviceSettings {
        DeviceSettings {
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            video_input: "/nonexistent/video0".into(),
            ..DeviceSettings::default()
        }
    }

    #[tokio::test]
    async fn missing_capture_device_is_reported_unavailable() {
        let camera = FfmpegCamera::new(settings());
        assert!(matches!(
            camera.open().await,
            Err(MediaError::DeviceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn stopped_stream_refuses_new_segments() {
        let stream = FfmpegStream {
            settings: settings(),
            stop: CancellationToken::new(),
        };
        stream.stop_tracks();

        assert!(!stream.is_live());
        assert!(matches!(
            stream.record_segment(Duration::from_secs(10)).await,
            Err(MediaError::Stopped)
        ));
    }

    #[test]
    fn command_skips_audio_when_not_configured() {
        let stream = FfmpegStream {
            settings: DeviceSettings {
                audio_input: String::new(),
                ..DeviceSettings::default()
            },
            stop: CancellationToken::new(),
        };
        let cmd = stream.command(Duration::from_secs(10));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        assert!(!args.iter().any(|arg| arg == "alsa"));
        assert!(args.windows(2).any(|pair| pair[0] == "-t" && pair[1] == "10.000"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }
}
