//! Agency Notify - real-time notification service for the agency back office
//!
//! Students, agents, admins and team members hold a WebSocket connection.
//! Events sent over it are stored as notifications and fanned out to
//! per-user channels and to a shared admin channel, and every event is
//! answered with a diagnostic envelope.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
