//! SonarQube API client and types.
//!
//! This module provides the interface for communicating with the SonarQube
//! Web API.

pub mod auth;
mod client;
mod directory;
pub mod error;
pub mod types;

pub use client::SonarClient;
pub use directory::UserDirectory;
