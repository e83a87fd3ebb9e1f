//! catprint library: print text and images on cat thermal printers via BLE.
//!
//! Main modules:
//! - ble: BLE transport (scan, connect, stream)
//! - binarize: image loading, binarization, preview
//! - dithering: binarization algorithms
//! - font: font resolution and glyph metrics
//! - wrap: pixel-accurate word wrapping
//! - render: canvas composition
//! - protocol: command encoding
//! - job: print job orchestration

pub mod ble;
pub mod binarize;
pub mod dithering;
pub mod error;
pub mod font;
pub mod job;
pub mod protocol;
pub mod render;
pub mod wrap;

/// BLE transport API: scan for printers, stream encoded jobs
pub use ble::{scan, BleTransport, DeviceInfo};
/// Binarization boundary
pub use binarize::{acquire, show_preview, BinarizedImage};
pub use dithering::Algorithm;
pub use error::{PrintError, PrintResult};
/// Orchestration API
pub use job::{run_job, JobInput, JobOptions, JobOutcome, Transport};
/// Protocol utilities (energy, packets, packing)
pub use protocol::{encode_print_commands, Energy, PRINT_WIDTH};
pub use render::render_text;
pub use wrap::WrapConfig;
