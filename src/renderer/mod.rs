//! On-screen rendering of the sculpture

pub mod viewport;

pub use viewport::{ViewParams, Viewport};
