//! State module for tracking pipeline progress
//!
//! # Components
//!
//! - `Phase`: The four fixed stages every crawl run passes through, in order

mod phase;

// Re-export main types
pub use phase::Phase;
