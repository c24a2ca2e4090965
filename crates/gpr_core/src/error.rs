//! Error types for the GPR bridge.
//!
//! Every failure that can reach a caller is one [`GprError`] carrying
//! structured context. Native failure signals, I/O errors and escaped
//! panics are all re-expressed here; nothing codec-specific crosses
//! the boundary unmapped.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations.
pub type GprResult<T> = Result<T, GprError>;

/// Coarse error classification for catch-by-kind branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// File validation or I/O failure.
    File,
    /// Allocation failure or invalid allocation size.
    Memory,
    /// Invalid parameter name, value or requested pixel type.
    Parameter,
    /// Geometry or buffer-size mismatch, unknown container format.
    Format,
    /// The codec reported a failure flag.
    Conversion,
    /// Any failure with no more specific mapping.
    Generic,
}

/// Errors raised by GPR bridge operations.
#[derive(Debug, Error)]
pub enum GprError {
    /// The input path does not exist.
    #[error("file not found: {}", .path.display())]
    FileNotFound {
        /// Path that was probed.
        path: PathBuf,
    },

    /// Access to the file was denied.
    #[error("permission denied for {operation} on {}", .path.display())]
    FilePermission {
        /// Path that was accessed.
        path: PathBuf,
        /// Operation being attempted.
        operation: &'static str,
    },

    /// The file is empty or its contents are unusable.
    #[error("file is empty or corrupted: {} ({reason})", .path.display())]
    FileCorrupted {
        /// Path of the offending file.
        path: PathBuf,
        /// Why the file was rejected.
        reason: String,
    },

    /// An I/O failure with no more specific classification.
    #[error("I/O error during {operation} on {}: {source}", .path.display())]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Operation being attempted.
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The allocator returned null.
    #[error("memory allocation of {requested_size} bytes failed")]
    Memory {
        /// Size that was requested, in bytes.
        requested_size: usize,
    },

    /// An invalid parameter name or value.
    #[error("invalid parameter {name}: {message}")]
    Parameter {
        /// Name of the offending parameter or field.
        name: String,
        /// What was wrong, including the allowed range or set.
        message: String,
    },

    /// Geometry or buffer-size mismatch.
    #[error("format error: {message}")]
    Format {
        /// Description of the mismatch.
        message: String,
    },

    /// A container format outside the supported set.
    #[error("unsupported format '{format}': supported formats: {}", .supported.join(", "))]
    UnsupportedFormat {
        /// The rejected format name.
        format: String,
        /// Formats the operation accepts.
        supported: Vec<&'static str>,
    },

    /// The codec returned its failure flag.
    #[error("{operation} failed (input: {}, output: {})", .input.display(), .output.display())]
    Conversion {
        /// Name of the codec entry point.
        operation: &'static str,
        /// Input path of the operation.
        input: PathBuf,
        /// Output path of the operation. Equals the input path for
        /// operations that produce in-memory results.
        output: PathBuf,
    },

    /// A failure with no known mapping, original message preserved.
    #[error("{0}")]
    Generic(String),
}

impl GprError {
    /// Returns the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::FilePermission { .. }
            | Self::FileCorrupted { .. }
            | Self::Io { .. } => ErrorKind::File,
            Self::Memory { .. } => ErrorKind::Memory,
            Self::Parameter { .. } => ErrorKind::Parameter,
            Self::Format { .. } | Self::UnsupportedFormat { .. } => ErrorKind::Format,
            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::Generic(_) => ErrorKind::Generic,
        }
    }

    /// Returns the canonical numeric code, if the variant has one.
    ///
    /// Codes follow the error-code vocabulary of the GPR library
    /// bindings: `-1` generic I/O, `-2` not found, `-3` permission,
    /// `-4` corrupted/empty, `-10` memory, `-20` parameter, `-30`
    /// format, `-31` unsupported format, `-40` conversion.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Io { .. } => Some(-1),
            Self::FileNotFound { .. } => Some(-2),
            Self::FilePermission { .. } => Some(-3),
            Self::FileCorrupted { .. } => Some(-4),
            Self::Memory { .. } => Some(-10),
            Self::Parameter { .. } => Some(-20),
            Self::Format { .. } => Some(-30),
            Self::UnsupportedFormat { .. } => Some(-31),
            Self::Conversion { .. } => Some(-40),
            Self::Generic(_) => None,
        }
    }

    /// Creates a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a corrupted-file error.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileCorrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parameter error.
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates a conversion error carrying both paths.
    pub fn conversion(
        operation: &'static str,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self::Conversion {
            operation,
            input: input.into(),
            output: output.into(),
        }
    }

    /// Creates a generic error preserving the original message.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    /// Maps an OS error to the file-error taxonomy.
    pub fn from_io(path: impl Into<PathBuf>, operation: &'static str, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            io::ErrorKind::PermissionDenied => Self::FilePermission { path, operation },
            _ => Self::Io {
                path,
                operation,
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn canonical_codes() {
        assert_eq!(GprError::file_not_found("a.gpr").code(), Some(-2));
        assert_eq!(
            GprError::FilePermission {
                path: "a.gpr".into(),
                operation: "read",
            }
            .code(),
            Some(-3)
        );
        assert_eq!(GprError::corrupted("a.gpr", "empty file").code(), Some(-4));
        assert_eq!(GprError::Memory { requested_size: 64 }.code(), Some(-10));
        assert_eq!(GprError::parameter("dtype", "bad").code(), Some(-20));
        assert_eq!(GprError::format("short buffer").code(), Some(-30));
        assert_eq!(
            GprError::UnsupportedFormat {
                format: "bmp".into(),
                supported: vec!["gpr", "dng"],
            }
            .code(),
            Some(-31)
        );
        assert_eq!(
            GprError::conversion("gpr_to_dng", "in.gpr", "out.dng").code(),
            Some(-40)
        );
        assert_eq!(GprError::generic("boom").code(), None);
    }

    #[test]
    fn kinds_cover_all_variants() {
        assert_eq!(GprError::file_not_found("x").kind(), ErrorKind::File);
        assert_eq!(
            GprError::Memory { requested_size: 1 }.kind(),
            ErrorKind::Memory
        );
        assert_eq!(GprError::parameter("n", "m").kind(), ErrorKind::Parameter);
        assert_eq!(GprError::format("m").kind(), ErrorKind::Format);
        assert_eq!(
            GprError::conversion("op", "i", "o").kind(),
            ErrorKind::Conversion
        );
        assert_eq!(GprError::generic("m").kind(), ErrorKind::Generic);
    }

    #[test]
    fn io_mapping_selects_specific_variants() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "nope");
        assert!(matches!(
            GprError::from_io("f", "read", not_found),
            GprError::FileNotFound { .. }
        ));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            GprError::from_io("f", "read", denied),
            GprError::FilePermission { .. }
        ));

        let other = io::Error::new(io::ErrorKind::UnexpectedEof, "nope");
        let err = GprError::from_io("f", "read", other);
        assert!(matches!(err, GprError::Io { .. }));
        assert_eq!(err.code(), Some(-1));
    }

    #[test]
    fn messages_carry_context() {
        let err = GprError::conversion("gpr_to_dng", Path::new("in.gpr"), Path::new("out.dng"));
        let msg = err.to_string();
        assert!(msg.contains("in.gpr"));
        assert!(msg.contains("out.dng"));
        assert!(msg.contains("gpr_to_dng"));

        let err = GprError::UnsupportedFormat {
            format: "bmp".into(),
            supported: vec!["uint16", "float32"],
        };
        assert!(err.to_string().contains("uint16, float32"));
    }
}
