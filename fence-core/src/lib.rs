//! Fence Core - Region model, delimiting, and configuration
//!
//! This crate contains the pure parsing side of fence, independent of rendering:
//! - Region model and classification
//! - Delimiting fenced blocks and file references out of buffer text
//! - Content addressing of regions
//! - Diagnostics and configuration

pub mod config;
pub mod delimit;
pub mod diagnostic;
pub mod identity;
pub mod params;
pub mod region;

// Re-export commonly used types
pub use config::Config;
pub use delimit::{delimit, Delimited, Delimiter};
pub use diagnostic::{Diagnostic, DiagnosticLevel};
pub use region::{LineRange, Region, RegionKind};
