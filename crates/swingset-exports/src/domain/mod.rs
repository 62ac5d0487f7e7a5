//! # Domain Module
//!
//! Core types for swing-store exports: entities, errors, the manifest codec
//! and the operation state machine.

pub mod entities;
pub mod errors;
pub mod manifest;
pub mod operation;

pub use entities::*;
pub use errors::*;
pub use manifest::*;
pub use operation::*;
