//! # IPC Module
//!
//! Wire encoding of the requests sent to the execution engine.

pub mod action;

pub use action::{
    decode_export_dir, ExportRequest, ImportOptions, SwingStoreExportAction,
    SWING_STORE_EXPORT_ACTION_TYPE,
};
