pub mod body_limit;

pub use body_limit::json_payload_too_large;
