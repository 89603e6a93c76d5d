pub mod convert;
pub mod events;
pub mod health;
pub mod images;
