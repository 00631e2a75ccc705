//! Route handlers module.

pub mod health;
pub mod onboard;
pub mod share;
