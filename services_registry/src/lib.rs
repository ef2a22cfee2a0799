//! # Process and Extension Registries
//!
//! This crate holds the two lookup tables the kernel is configured with.
//!
//! ## Philosophy
//!
//! Unlike traditional program loaders (paths, binaries), processes are
//! registered and looked up by image name, and kernel services are handed
//! out through typed interface keys instead of free-form dynamic lookup.
//!
//! - [`ProcessRegistry`]: image name -> process constructor
//! - [`ExtensionRegistry`]: which interfaces each process context receives
//! - [`Bundle`]: a group of images installed together, optionally with a
//!   root image to boot

pub mod bundle;
pub mod extensions;
pub mod images;

pub use bundle::Bundle;
pub use extensions::ExtensionRegistry;
pub use images::ProcessRegistry;

use thiserror::Error;

/// Error types for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Image name already registered
    #[error("Image already registered: {0}")]
    ImageAlreadyRegistered(String),

    /// Extension key already registered
    #[error("Extension already registered: {0}")]
    ExtensionAlreadyRegistered(String),

    /// Extension key not registered
    #[error("Extension not found: {0}")]
    ExtensionNotFound(String),
}
