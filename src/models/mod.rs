//! Growth curve shape implementations.
//!
//! Shapes are implemented as small, pure functions so that fitting code can
//! stay generic over the shape.

pub mod model;

pub use model::*;
