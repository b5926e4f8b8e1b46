//! arcade_drive - engine-agnostic car drive/traction model (pure types + per-tick step)

pub mod controller;
pub mod drivetrain;
pub mod steering;
pub mod traction;
pub mod types;

pub use controller::CarController;
pub use types::*;
