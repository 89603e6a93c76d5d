/// Path of the conversion endpoint, relative to the service URL.
pub const CONVERT_PATH: &str = "/convert";

/// Content type carried by every conversion task body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Metadata key on the uploaded object holding the output base name.
pub const METADATA_NAME_KEY: &str = "name";

/// Metadata key on the uploaded object holding the comma-separated format list.
pub const METADATA_FORMATS_KEY: &str = "formats";

/// Separator between format tokens in the `formats` metadata value.
pub const FORMAT_SEPARATOR: char = ',';

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_QUEUE_LOCATION: &str = "us-central1";
pub const DEFAULT_QUEUE_NAME: &str = "q1";
pub const DEFAULT_CLOUD_TASKS_ENDPOINT: &str = "https://cloudtasks.googleapis.com";
