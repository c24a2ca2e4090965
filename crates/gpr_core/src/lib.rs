//! # gpr_core
//!
//! Safe bridge to the GPR (General Purpose Raw) codec.
//!
//! The native codec works in malloc-style buffers, boolean result
//! flags and caller-managed lifetimes. This crate wraps that surface
//! so the rest of the workspace — and the Python bindings on top —
//! never touch a raw pointer:
//!
//! - [`Allocator`] pins one allocate/free pair per operation and
//!   counts traffic through it
//! - [`NativeBuffer`] owns codec memory with guaranteed single release
//! - [`GprError`] is the typed taxonomy every failure maps into,
//!   carrying path and parameter context
//! - [`Codec`] is the seam to the native entry points; [`NativeCodec`]
//!   loads them at runtime, tests substitute in-process doubles
//! - [`convert`] runs the file-to-file conversions with validation,
//!   panic containment and atomic output writes
//! - [`metadata`] decodes and rewrites EXIF blocks as exact fractions
//! - [`RawImage`] materializes decoded pixels as a zero-copy 16-bit
//!   view or an owned normalized float array
//!
//! ```no_run
//! use gpr_core::{raw_pixels, NativeCodec, PixelType};
//! use std::path::Path;
//!
//! # fn main() -> gpr_core::GprResult<()> {
//! let codec = NativeCodec::load()?;
//! let image = raw_pixels(&codec, Path::new("clip.gpr"), PixelType::U16)?;
//! let view = image.as_u16().unwrap();
//! println!("{}x{}", view.ncols(), view.nrows());
//! # Ok(())
//! # }
//! ```

pub mod alloc;
pub mod buffer;
pub mod codec;
pub mod convert;
pub mod error;
pub mod image;
pub mod metadata;
pub mod params;

pub use alloc::{AllocationStats, Allocator};
pub use buffer::NativeBuffer;
pub use codec::{Codec, Conversion, NativeCodec};
pub use convert::{
    convert_file, convert_to_buffer, detect_format, dng_to_dng, dng_to_gpr, gpr_to_dng,
    gpr_to_raw, ContainerFormat,
};
pub use error::{ErrorKind, GprError, GprResult};
pub use image::{image_info, raw_pixels, GprImage, ImageInfo, PixelType, RawImage};
pub use metadata::{
    read_exif, read_profile, update_exif, DateTime, ExifInfo, ExifUpdate, GpsCoordinate, GpsInfo,
    ProfileInfo, Rational, SignedRational,
};
pub use params::{OverrideValue, ParameterOverrides, Parameters, RECOGNIZED_PARAMETERS};
