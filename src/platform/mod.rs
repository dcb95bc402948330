//! Platform surface the preview lives in: container geometry and resize events
//!
//! The form, window chrome and event loop are owned by the host application.
//! This module is the narrow seam through which the host tells the preview
//! how much room it has.

pub mod viewport;

pub use viewport::{ContainerSize, ResizeEvents, Subscription};
