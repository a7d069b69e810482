//! Device seams: location and camera/microphone.
//!
//! The coordinator only sees these traits; concrete providers are chosen
//! by whoever constructs it.

pub mod ffmpeg;
pub mod geolocation;
pub mod media;

pub use ffmpeg::FfmpegCamera;
pub use geolocation::{GeolocationProvider, LocationSource, StaticLocationSource};
pub use media::{MediaDevice, MediaStream, OwnedStream, RecordedClip, RecorderHandle};
