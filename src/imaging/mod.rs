//! Image derivation — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize → JPEG/PNG** | Lanczos3 + `image` encoders |
//! | **Crop / watermark / link bar** | `crop_imm` + alpha `overlay` |
//! | **Sharpening** | `image::imageops::unsharpen` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing derivation work
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`DeriveEngine`] combining calculations + backend,
//!   plus the [`PhotoClassifier`]
//! - **Figure**: responsive figure fragments and caption similarity

pub mod backend;
mod calculations;
pub mod figure;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{plan_variants, scale_dimensions};
pub use figure::{caption_for, figure_fragment, similarity};
pub use operations::{Derivative, DerivativeSet, DeriveEngine, DeriveOptions, PhotoClassifier};
pub use params::{Overlay, Quality, Sharpening};
pub use rust_backend::RustBackend;
