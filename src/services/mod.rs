//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own tutoring logic and persistence calls so route
//! handlers stay focused on request parsing and auth plumbing.

pub mod agents;
pub mod events;
pub mod executor;
pub mod lessons;
pub mod progress;
pub mod pysource;
pub mod session;
pub mod tutor;
pub mod users;
