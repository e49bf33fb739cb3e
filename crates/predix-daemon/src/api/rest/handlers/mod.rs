//! API request handlers

mod health;
mod realtime;

pub use health::*;
pub use realtime::*;
