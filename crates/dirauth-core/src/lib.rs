//! # dirauth-core
//!
//! Foundation types for the directory authentication adapter.
//!
//! This crate provides the shared error taxonomy and the admin credential
//! type consumed by the protocol-specific adapter crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and error code mapping
//! - [`credentials`] - Admin bind credentials

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod error;

// Re-export commonly used types
pub use credentials::AdminCredentials;
pub use error::{Error, Result};
