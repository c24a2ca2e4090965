//! Runtime loader for the native GPR codec library.
//!
//! The codec is bound at runtime with `libloading` rather than at link
//! time, so the bridge builds and its test suites run on machines
//! without `libgpr` installed. Entry points are resolved once at load
//! and kept as plain function pointers; the `Library` handle is held
//! alongside them to keep the mapping alive.

use crate::{gpr_convert_fn, gpr_parse_metadata_fn};
use libloading::Library;
use std::ffi::OsStr;
use std::fmt;

/// Default shared-object name probed by [`GprLibrary::load`].
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAME: &str = "gpr.dll";
/// Default shared-object name probed by [`GprLibrary::load`].
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "libgpr.dylib";
/// Default shared-object name probed by [`GprLibrary::load`].
#[cfg(all(unix, not(target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "libgpr.so";

/// Failure to bind the native codec.
#[derive(Debug)]
pub struct LoadError {
    /// What was being loaded when the failure happened.
    pub what: String,
    source: libloading::Error,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load {}: {}", self.what, self.source)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Resolved entry points of one loaded `libgpr` instance.
pub struct GprLibrary {
    // The Library handle must outlive every resolved pointer.
    convert_gpr_to_dng: gpr_convert_fn,
    convert_dng_to_gpr: gpr_convert_fn,
    convert_gpr_to_raw: gpr_convert_fn,
    convert_dng_to_dng: gpr_convert_fn,
    parse_metadata: gpr_parse_metadata_fn,
    _lib: Library,
}

impl fmt::Debug for GprLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GprLibrary").finish_non_exhaustive()
    }
}

impl GprLibrary {
    /// Loads the codec from the platform's default library name.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the library cannot be mapped or any
    /// entry point is missing.
    pub fn load() -> Result<Self, LoadError> {
        Self::load_from(DEFAULT_LIBRARY_NAME)
    }

    /// Loads the codec from an explicit path or name.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the library cannot be mapped or any
    /// entry point is missing.
    pub fn load_from(path: impl AsRef<OsStr>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        // Safety: libgpr has no constrained initialization routines.
        let lib = unsafe { Library::new(path) }.map_err(|source| LoadError {
            what: path.to_string_lossy().into_owned(),
            source,
        })?;

        unsafe {
            let convert_gpr_to_dng =
                *Self::symbol::<gpr_convert_fn>(&lib, b"gpr_convert_gpr_to_dng\0")?;
            let convert_dng_to_gpr =
                *Self::symbol::<gpr_convert_fn>(&lib, b"gpr_convert_dng_to_gpr\0")?;
            let convert_gpr_to_raw =
                *Self::symbol::<gpr_convert_fn>(&lib, b"gpr_convert_gpr_to_raw\0")?;
            let convert_dng_to_dng =
                *Self::symbol::<gpr_convert_fn>(&lib, b"gpr_convert_dng_to_dng\0")?;
            let parse_metadata =
                *Self::symbol::<gpr_parse_metadata_fn>(&lib, b"gpr_parse_metadata\0")?;

            Ok(Self {
                convert_gpr_to_dng,
                convert_dng_to_gpr,
                convert_gpr_to_raw,
                convert_dng_to_dng,
                parse_metadata,
                _lib: lib,
            })
        }
    }

    unsafe fn symbol<'l, T>(
        lib: &'l Library,
        name: &[u8],
    ) -> Result<libloading::Symbol<'l, T>, LoadError> {
        lib.get(name).map_err(|source| LoadError {
            what: format!("symbol {}", String::from_utf8_lossy(&name[..name.len() - 1])),
            source,
        })
    }

    /// `gpr_convert_gpr_to_dng` entry point.
    #[must_use]
    pub fn convert_gpr_to_dng(&self) -> gpr_convert_fn {
        self.convert_gpr_to_dng
    }

    /// `gpr_convert_dng_to_gpr` entry point.
    #[must_use]
    pub fn convert_dng_to_gpr(&self) -> gpr_convert_fn {
        self.convert_dng_to_gpr
    }

    /// `gpr_convert_gpr_to_raw` entry point.
    #[must_use]
    pub fn convert_gpr_to_raw(&self) -> gpr_convert_fn {
        self.convert_gpr_to_raw
    }

    /// `gpr_convert_dng_to_dng` entry point.
    #[must_use]
    pub fn convert_dng_to_dng(&self) -> gpr_convert_fn {
        self.convert_dng_to_dng
    }

    /// `gpr_parse_metadata` entry point.
    #[must_use]
    pub fn parse_metadata(&self) -> gpr_parse_metadata_fn {
        self.parse_metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_library_reports_name() {
        let err = GprLibrary::load_from("libgpr-does-not-exist.so").unwrap_err();
        assert!(err.what.contains("libgpr-does-not-exist"));
        assert!(err.to_string().contains("failed to load"));
    }
}
