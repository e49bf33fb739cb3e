//! REST endpoints and the real-time upgrade route

pub mod handlers;
pub mod router;
pub mod state;
