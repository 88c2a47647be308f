//! Interpolation helpers.
//!
//! Numeric channels blend linearly after easing the segment-local t through
//! the curve of the segment's left key.

pub mod functions;

pub use functions::ease;
