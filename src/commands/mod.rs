//! Command handlers
//!
//! Each handler drives one user-facing operation against the shared `App`
//! services and returns plain data for the caller to render.

pub mod account;
pub mod recording;
pub mod retrieval;
