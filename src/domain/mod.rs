//! Domain layer for the Cadence coordination kernel
//!
//! This module contains the core models, the collaborator ports and the
//! domain error type.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
