//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and produce. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, zero
//! external dependencies, statically linked into the binary. Tests use the
//! recording mock in this module so derivation logic can be exercised
//! without encoding a single pixel.

use super::params::{VariantOutput, VariantParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding the full image.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Produce one derivative: resize, optional crop, optional overlay,
    /// sharpen, encode, write.
    fn produce(&self, params: &VariantParams) -> Result<VariantOutput, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::Overlay;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Produce {
            output: String,
            width: u32,
            height: u32,
            crop_to: Option<u32>,
            overlay: Overlay,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Dimensions are popped per identify call, so push them in
        /// reverse order of expected lookups when queueing several.
        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn produce(&self, params: &VariantParams) -> Result<VariantOutput, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Produce {
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                crop_to: params.crop_to,
                overlay: params.overlay.clone(),
                quality: params.quality.value(),
            });

            // Write a stub so freshness checks see the file.
            if let Some(parent) = params.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&params.output, b"mock")?;

            let edge = params.crop_to;
            Ok(VariantOutput {
                width: edge.unwrap_or(params.width),
                height: edge.unwrap_or(params.height),
                bytes: 4,
            })
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_records_produce_and_writes_stub() {
        use crate::imaging::params::Quality;
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out-360.jpg");

        let result = backend
            .produce(&VariantParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 360,
                height: 270,
                crop_to: None,
                overlay: Overlay::None,
                quality: Quality::new(83),
                sharpening: None,
            })
            .unwrap();

        assert_eq!((result.width, result.height), (360, 270));
        assert!(output.exists());

        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Produce {
                width: 360,
                height: 270,
                quality: 83,
                ..
            }
        ));
    }

    #[test]
    fn mock_crop_reports_square_output() {
        use crate::imaging::params::Quality;
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();

        let result = backend
            .produce(&VariantParams {
                source: "/source.jpg".into(),
                output: tmp.path().join("out-90c.jpg"),
                width: 120,
                height: 90,
                crop_to: Some(90),
                overlay: Overlay::None,
                quality: Quality::default(),
                sharpening: None,
            })
            .unwrap();

        assert_eq!((result.width, result.height), (90, 90));
    }
}
