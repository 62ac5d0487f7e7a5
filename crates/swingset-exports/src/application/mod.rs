//! # Application Layer
//!
//! The exports handler service, the retrieve handle it lends to event
//! handlers, and the restore path.

pub mod restore;
pub mod retrieve;
pub mod service;

pub use restore::stage_export;
pub use retrieve::RetrieveExport;
pub use service::SwingStoreExportsHandler;
