pub mod alert;
pub mod evidence;
pub mod location;

pub use alert::{Alert, AlertId, AlertMetadata, AlertStatus, ResolutionReport, ResolvedBy};
pub use evidence::{EvidenceSegment, UploadStatus};
pub use location::{FacilityKind, Location, SafeLocation};
