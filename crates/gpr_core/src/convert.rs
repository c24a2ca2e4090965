//! File-to-file conversion operations.
//!
//! Every operation follows the same shape: validate the input path,
//! read it into a native buffer, hand it to the codec under a panic
//! guard, adopt the output buffer the codec allocated, and persist it
//! atomically. Failures at any step surface as typed [`GprError`]s
//! carrying the paths involved; buffers are released by `Drop` on every
//! exit path.

use crate::alloc::Allocator;
use crate::buffer::NativeBuffer;
use crate::codec::{Codec, Conversion};
use crate::error::{GprError, GprResult};
use crate::params::{ParameterOverrides, Parameters};
use gpr_sys::gpr_buffer;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Container formats the bridge recognizes, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// GoPro GPR container.
    Gpr,
    /// Adobe DNG container.
    Dng,
    /// Headerless 16-bit raw pixel data.
    Raw,
}

impl ContainerFormat {
    /// Canonical lowercase extension.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gpr => "gpr",
            Self::Dng => "dng",
            Self::Raw => "raw",
        }
    }

    const SUPPORTED: [&'static str; 3] = ["gpr", "dng", "raw"];
}

/// Classifies a file by its extension, case-insensitively.
///
/// # Errors
///
/// A missing or unrecognized extension fails with an
/// unsupported-format error listing the recognized set.
pub fn detect_format(path: &Path) -> GprResult<ContainerFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("gpr") => Ok(ContainerFormat::Gpr),
        Some("dng") => Ok(ContainerFormat::Dng),
        Some("raw") => Ok(ContainerFormat::Raw),
        other => Err(GprError::UnsupportedFormat {
            format: other.unwrap_or("").to_owned(),
            supported: ContainerFormat::SUPPORTED.to_vec(),
        }),
    }
}

/// Checks that `path` exists, is a regular file and is non-empty.
///
/// # Errors
///
/// Missing paths, directories, permission failures and empty files map
/// to the corresponding file errors.
pub(crate) fn validate_input_file(path: &Path) -> GprResult<()> {
    let metadata = std::fs::metadata(path).map_err(|e| GprError::from_io(path, "stat", e))?;
    if !metadata.is_file() {
        return Err(GprError::corrupted(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(GprError::corrupted(path, "file is empty"));
    }
    Ok(())
}

/// Runs a codec call under a panic guard.
///
/// A panic that crosses the codec seam would otherwise unwind into
/// foreign frames; here it is caught and reported as a generic error
/// that preserves the panic message.
pub(crate) fn guard_invoke<F>(operation: &'static str, call: F) -> GprResult<bool>
where
    F: FnOnce() -> bool,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(ok) => Ok(ok),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_owned()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_owned()
            };
            tracing::error!(operation, message = %message, "codec panicked");
            Err(GprError::generic(format!(
                "{operation} panicked: {message}"
            )))
        }
    }
}

/// Invokes one conversion and adopts the codec-allocated output.
///
/// On a `false` return the out-buffer is released through the same
/// allocator before the error is built, so a partially filled
/// descriptor never leaks.
pub(crate) fn invoke_convert(
    codec: &dyn Codec,
    kind: Conversion,
    allocator: &Allocator,
    parameters: &Parameters,
    input: &[u8],
    input_path: &Path,
    output_path: &Path,
) -> GprResult<NativeBuffer> {
    let mut out = gpr_buffer::empty();
    let result = guard_invoke(kind.operation_name(), || {
        codec.convert(kind, allocator, parameters, input, &mut out)
    });

    match result {
        Ok(true) => {
            // Ownership of the codec's block transfers here. A null or
            // empty output despite a success flag is still a failure.
            match unsafe { NativeBuffer::from_raw(out, *allocator) } {
                Some(buffer) if !buffer.is_empty() => Ok(buffer),
                _ => Err(GprError::conversion(
                    kind.operation_name(),
                    input_path,
                    output_path,
                )),
            }
        }
        Ok(false) => {
            unsafe { allocator.release_raw(&mut out) };
            Err(GprError::conversion(
                kind.operation_name(),
                input_path,
                output_path,
            ))
        }
        Err(err) => {
            unsafe { allocator.release_raw(&mut out) };
            Err(err)
        }
    }
}

fn prepare_parameters(
    codec: &dyn Codec,
    kind: Conversion,
    allocator: &Allocator,
    input: &NativeBuffer,
    input_path: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<Parameters> {
    let mut params = Parameters::new(*allocator);

    // Encoding needs the source geometry and metadata carried over;
    // for decoding the container itself is authoritative.
    if matches!(kind, Conversion::DngToGpr | Conversion::DngToDng) {
        let ok = guard_invoke("gpr_parse_metadata", || {
            codec.parse_metadata(allocator, input.as_slice(), &mut params)
        })?;
        if !ok {
            return Err(GprError::conversion(
                "gpr_parse_metadata",
                input_path,
                input_path,
            ));
        }
    }

    overrides.apply(&mut params)?;
    Ok(params)
}

/// Converts a container file to a buffer held in memory.
///
/// # Errors
///
/// Input validation, extension mismatch, parameter overrides and codec
/// failures each map to their typed error; see [`GprError`].
pub fn convert_to_buffer(
    codec: &dyn Codec,
    kind: Conversion,
    input_path: &Path,
    output_path: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<NativeBuffer> {
    let expected = kind.input_format();
    let actual = detect_format(input_path)?;
    if actual != expected {
        return Err(GprError::UnsupportedFormat {
            format: actual.name().to_owned(),
            supported: vec![expected.name()],
        });
    }
    validate_input_file(input_path)?;

    let allocator = Allocator::global();
    let input = NativeBuffer::from_file(input_path, allocator)?;
    let params = prepare_parameters(codec, kind, &allocator, &input, input_path, overrides)?;

    tracing::debug!(
        operation = kind.operation_name(),
        input = %input_path.display(),
        bytes = input.len(),
        "converting"
    );
    let output = invoke_convert(
        codec,
        kind,
        &allocator,
        &params,
        input.as_slice(),
        input_path,
        output_path,
    )?;
    tracing::debug!(
        operation = kind.operation_name(),
        bytes = output.len(),
        "conversion complete"
    );
    Ok(output)
}

/// Converts a container file to another container file.
///
/// The output is written atomically: the bytes land in a temporary
/// file beside `output_path` and are renamed into place, so a failed
/// conversion never truncates an existing output.
///
/// # Errors
///
/// Same surface as [`convert_to_buffer`], plus write failures on the
/// output path.
pub fn convert_file(
    codec: &dyn Codec,
    kind: Conversion,
    input_path: &Path,
    output_path: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<()> {
    let output = convert_to_buffer(codec, kind, input_path, output_path, overrides)?;
    output.write_to_file(output_path)?;
    Ok(())
}

/// Converts a GPR container to a DNG container.
///
/// # Errors
///
/// See [`convert_file`].
pub fn gpr_to_dng(
    codec: &dyn Codec,
    input: &Path,
    output: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<()> {
    convert_file(codec, Conversion::GprToDng, input, output, overrides)
}

/// Converts a DNG container to a GPR container.
///
/// # Errors
///
/// See [`convert_file`].
pub fn dng_to_gpr(
    codec: &dyn Codec,
    input: &Path,
    output: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<()> {
    convert_file(codec, Conversion::DngToGpr, input, output, overrides)
}

/// Extracts the raw 16-bit pixel data of a GPR container to a file.
///
/// # Errors
///
/// See [`convert_file`].
pub fn gpr_to_raw(
    codec: &dyn Codec,
    input: &Path,
    output: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<()> {
    convert_file(codec, Conversion::GprToRaw, input, output, overrides)
}

/// Rewrites a DNG container through the codec.
///
/// # Errors
///
/// See [`convert_file`].
pub fn dng_to_dng(
    codec: &dyn Codec,
    input: &Path,
    output: &Path,
    overrides: &ParameterOverrides,
) -> GprResult<()> {
    convert_file(codec, Conversion::DngToDng, input, output, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detect_format_is_case_insensitive() {
        assert_eq!(
            detect_format(Path::new("clip.GPR")).unwrap(),
            ContainerFormat::Gpr
        );
        assert_eq!(
            detect_format(Path::new("shot.dng")).unwrap(),
            ContainerFormat::Dng
        );
        assert_eq!(
            detect_format(Path::new("frame.Raw")).unwrap(),
            ContainerFormat::Raw
        );
    }

    #[test]
    fn unknown_extension_lists_supported_formats() {
        let err = detect_format(Path::new("image.jpeg")).unwrap_err();
        assert_eq!(err.code(), Some(-31));
        let message = err.to_string();
        assert!(message.contains("gpr"));
        assert!(message.contains("dng"));
        assert!(message.contains("raw"));
    }

    #[test]
    fn missing_extension_is_unsupported() {
        assert_eq!(
            detect_format(Path::new("noext")).unwrap_err().code(),
            Some(-31)
        );
    }

    #[test]
    fn validate_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.gpr");
        assert_eq!(
            validate_input_file(&missing).unwrap_err().code(),
            Some(-2)
        );

        let empty = dir.path().join("empty.gpr");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(validate_input_file(&empty).unwrap_err().code(), Some(-4));
    }

    #[test]
    fn validate_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_input_file(dir.path()).unwrap_err();
        assert_eq!(err.code(), Some(-4));
    }

    #[test]
    fn guard_reports_panics_as_generic_errors() {
        let err = guard_invoke("gpr_convert_gpr_to_dng", || {
            panic!("native assertion failed")
        })
        .unwrap_err();
        assert_eq!(err.code(), None);
        let message = err.to_string();
        assert!(message.contains("gpr_convert_gpr_to_dng"));
        assert!(message.contains("native assertion failed"));
    }

    #[test]
    fn guard_passes_flags_through() {
        assert!(guard_invoke("op", || true).unwrap());
        assert!(!guard_invoke("op", || false).unwrap());
    }

    #[test]
    fn wrong_input_extension_is_rejected_before_io() {
        struct Never;
        impl Codec for Never {
            fn convert(
                &self,
                _: Conversion,
                _: &Allocator,
                _: &Parameters,
                _: &[u8],
                _: &mut gpr_buffer,
            ) -> bool {
                unreachable!("codec must not be reached")
            }
            fn parse_metadata(&self, _: &Allocator, _: &[u8], _: &mut Parameters) -> bool {
                unreachable!("codec must not be reached")
            }
        }

        let err = convert_to_buffer(
            &Never,
            Conversion::GprToDng,
            &PathBuf::from("input.dng"),
            &PathBuf::from("output.dng"),
            &ParameterOverrides::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), Some(-31));
    }
}
