pub mod conversion;
pub mod event;
pub mod format;

pub use conversion::ConversionPayload;
pub use event::{parse_format_list, EventError, ObjectFinalizedEvent, UploadEvent};
pub use format::{TargetFormat, UnknownFormat};
