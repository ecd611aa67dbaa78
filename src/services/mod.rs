//! Domain services used by the HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and talk to the repositories and
//! the change feed through `AppState`, so route handlers stay focused on
//! protocol translation and auth plumbing.

pub mod appointment;
pub mod assessment;
pub mod auth;
pub mod booking;
pub mod dashboard;
pub mod images;
pub mod notification;
pub mod password;
pub mod payment;
pub mod profile;
pub mod progress;
pub mod session;
