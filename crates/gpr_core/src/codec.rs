//! Codec seam between the safe operation layer and the native library.
//!
//! Every conversion and metadata operation goes through the [`Codec`]
//! trait. Production code uses [`NativeCodec`], which resolves the
//! entry points of `libgpr` at runtime; tests substitute in-process
//! implementations without touching the loader.

use crate::alloc::Allocator;
use crate::error::{GprError, GprResult};
use crate::params::Parameters;
use gpr_sys::{gpr_buffer, gpr_convert_fn, GprLibrary};
use std::ffi::OsStr;
use std::fmt;

/// The four supported container conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Decode a GPR container into a DNG container.
    GprToDng,
    /// Encode a DNG container into a GPR container.
    DngToGpr,
    /// Decode a GPR container into raw 16-bit pixel data.
    GprToRaw,
    /// Rewrite a DNG container, re-embedding its metadata.
    DngToDng,
}

impl Conversion {
    /// Name of the native entry point, used in error reports and logs.
    #[must_use]
    pub const fn operation_name(&self) -> &'static str {
        match self {
            Self::GprToDng => "gpr_convert_gpr_to_dng",
            Self::DngToGpr => "gpr_convert_dng_to_gpr",
            Self::GprToRaw => "gpr_convert_gpr_to_raw",
            Self::DngToDng => "gpr_convert_dng_to_dng",
        }
    }

    /// Container format the conversion consumes.
    #[must_use]
    pub const fn input_format(&self) -> crate::convert::ContainerFormat {
        match self {
            Self::GprToDng | Self::GprToRaw => crate::convert::ContainerFormat::Gpr,
            Self::DngToGpr | Self::DngToDng => crate::convert::ContainerFormat::Dng,
        }
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_name())
    }
}

/// Raw-codec entry points behind a safe, substitutable interface.
///
/// Implementations report failure the way the C ABI does, as a boolean
/// flag; the operation layer translates flags into typed errors with
/// path context. On success the implementation must have filled
/// `output` with a block allocated through `allocator`, and ownership
/// of that block passes to the caller.
pub trait Codec: Send + Sync {
    /// Runs one container conversion.
    fn convert(
        &self,
        kind: Conversion,
        allocator: &Allocator,
        parameters: &Parameters,
        input: &[u8],
        output: &mut gpr_buffer,
    ) -> bool;

    /// Parses container metadata into `parameters`.
    fn parse_metadata(
        &self,
        allocator: &Allocator,
        input: &[u8],
        parameters: &mut Parameters,
    ) -> bool;
}

/// [`Codec`] backed by the runtime-loaded native library.
pub struct NativeCodec {
    library: GprLibrary,
}

impl NativeCodec {
    /// Loads the native library under its platform-default name.
    ///
    /// # Errors
    ///
    /// A missing library or missing symbol maps to a generic error
    /// carrying the loader's message.
    pub fn load() -> GprResult<Self> {
        let library = GprLibrary::load().map_err(|e| GprError::generic(e.to_string()))?;
        tracing::info!("native codec loaded");
        Ok(Self { library })
    }

    /// Loads the native library from an explicit path.
    ///
    /// # Errors
    ///
    /// Same surface as [`NativeCodec::load`].
    pub fn load_from(path: impl AsRef<OsStr>) -> GprResult<Self> {
        let library = GprLibrary::load_from(path).map_err(|e| GprError::generic(e.to_string()))?;
        tracing::info!("native codec loaded");
        Ok(Self { library })
    }

    fn entry_point(&self, kind: Conversion) -> gpr_convert_fn {
        match kind {
            Conversion::GprToDng => self.library.convert_gpr_to_dng(),
            Conversion::DngToGpr => self.library.convert_dng_to_gpr(),
            Conversion::GprToRaw => self.library.convert_gpr_to_raw(),
            Conversion::DngToDng => self.library.convert_dng_to_dng(),
        }
    }
}

impl Codec for NativeCodec {
    fn convert(
        &self,
        kind: Conversion,
        allocator: &Allocator,
        parameters: &Parameters,
        input: &[u8],
        output: &mut gpr_buffer,
    ) -> bool {
        let entry = self.entry_point(kind);
        let input_buf = gpr_buffer {
            buffer: input.as_ptr() as *mut std::os::raw::c_void,
            size: input.len(),
        };
        // The codec reads `input` for the duration of the call only and
        // writes `output` through the allocator it was handed.
        unsafe { entry(allocator.as_raw(), parameters.as_raw(), &input_buf, output) }
    }

    fn parse_metadata(
        &self,
        allocator: &Allocator,
        input: &[u8],
        parameters: &mut Parameters,
    ) -> bool {
        let mut input_buf = gpr_buffer {
            buffer: input.as_ptr() as *mut std::os::raw::c_void,
            size: input.len(),
        };
        unsafe {
            (self.library.parse_metadata())(
                allocator.as_raw(),
                &mut input_buf,
                parameters.as_raw_mut(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_match_native_symbols() {
        assert_eq!(
            Conversion::GprToDng.operation_name(),
            "gpr_convert_gpr_to_dng"
        );
        assert_eq!(
            Conversion::DngToDng.operation_name(),
            "gpr_convert_dng_to_dng"
        );
        assert_eq!(Conversion::GprToRaw.to_string(), "gpr_convert_gpr_to_raw");
    }

    #[test]
    fn input_formats_follow_the_conversion() {
        use crate::convert::ContainerFormat;
        assert_eq!(Conversion::GprToDng.input_format(), ContainerFormat::Gpr);
        assert_eq!(Conversion::GprToRaw.input_format(), ContainerFormat::Gpr);
        assert_eq!(Conversion::DngToGpr.input_format(), ContainerFormat::Dng);
        assert_eq!(Conversion::DngToDng.input_format(), ContainerFormat::Dng);
    }
}
