//! # msgmirror Testkit
//!
//! Test utilities for msgmirror.
//!
//! This crate provides:
//! - Message records and frame builders
//! - A reference replica model to check the engine against
//! - Property-based test generators using proptest
//! - Shared frame decoding vectors
//!
//! ## Usage
//!
//! ```rust
//! use msgmirror_testkit::prelude::*;
//!
//! let frame = add_frame("m1", &message("+1", "+2", "hi"));
//! assert!(frame.contains("\"add\""));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
