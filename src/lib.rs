//! Transit Hub - live bus location sharing.
//!
//! Vehicles publish location updates over HTTP; observers connected over
//! WebSocket receive each update in real time, and the set of active
//! journeys can be queried at any time.

pub mod config;
pub mod database;
pub mod error;
pub mod hub;
pub mod server;
pub mod store;
