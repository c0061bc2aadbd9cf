//! Shared domain model for the netwatch alerting engine.
//!
//! Everything the other crates exchange lives here: severity levels,
//! alert rules, alert records with their lifecycle status, notification
//! channel records, and mute entries. The types are plain data — behavior
//! (evaluation, dispatch, persistence) belongs to the downstream crates.

pub mod id;
pub mod types;
