//! Progressive ray tracing of the sculpture

pub mod accumulator;
pub mod editor;

pub use accumulator::{Accumulator, RayTraceData};
pub use editor::{default_lights, Light, RayTracingEditor};

#[cfg(test)]
mod tests;
