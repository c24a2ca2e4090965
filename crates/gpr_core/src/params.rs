//! Operation parameters and typed partial updates.

use crate::alloc::Allocator;
use crate::error::{GprError, GprResult};
use gpr_sys::{gpr_exif_info, gpr_parameters};

/// Dimension fields are encoded in 16 bits by the container format.
const MAX_DIMENSION: i64 = 65_535;

/// Safe owner of a native `gpr_parameters` block.
///
/// Created with defaults at the start of an operation and destroyed
/// exactly once at its end: `Drop` releases the GPMF payload through
/// the allocator the parameters were created with, on every exit path.
pub struct Parameters {
    raw: gpr_parameters,
    allocator: Allocator,
}

impl Parameters {
    /// Creates parameters with codec defaults, tied to `allocator`.
    #[must_use]
    pub fn new(allocator: Allocator) -> Self {
        Self {
            raw: gpr_parameters::default(),
            allocator,
        }
    }

    /// Width of the input source in pixels.
    #[must_use]
    pub fn input_width(&self) -> i32 {
        self.raw.input_width
    }

    /// Height of the input source in pixels.
    #[must_use]
    pub fn input_height(&self) -> i32 {
        self.raw.input_height
    }

    /// Pitch of the input source in pixels.
    #[must_use]
    pub fn input_pitch(&self) -> i32 {
        self.raw.input_pitch
    }

    /// Whether fast encoding is enabled.
    #[must_use]
    pub fn fast_encoding(&self) -> bool {
        self.raw.fast_encoding
    }

    /// Whether MD5 verification is enabled.
    #[must_use]
    pub fn compute_md5sum(&self) -> bool {
        self.raw.compute_md5sum
    }

    /// Whether the embedded preview image is enabled.
    #[must_use]
    pub fn enable_preview(&self) -> bool {
        self.raw.enable_preview
    }

    /// Size of the GPMF telemetry payload in bytes, zero when absent.
    #[must_use]
    pub fn gpmf_size(&self) -> usize {
        if self.raw.gpmf_payload.buffer.is_null() {
            0
        } else {
            self.raw.gpmf_payload.size
        }
    }

    /// Sets the input geometry. Used by codec implementations when
    /// parsing a container's metadata.
    pub fn set_geometry(&mut self, width: i32, height: i32, pitch: i32) {
        self.raw.input_width = width;
        self.raw.input_height = height;
        self.raw.input_pitch = pitch;
    }

    /// The embedded EXIF block.
    #[must_use]
    pub fn exif(&self) -> &gpr_exif_info {
        &self.raw.exif_info
    }

    /// Mutable access to the embedded EXIF block.
    pub fn exif_mut(&mut self) -> &mut gpr_exif_info {
        &mut self.raw.exif_info
    }

    pub(crate) fn as_raw(&self) -> &gpr_parameters {
        &self.raw
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut gpr_parameters {
        &mut self.raw
    }
}

impl std::fmt::Debug for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameters")
            .field("input_width", &self.raw.input_width)
            .field("input_height", &self.raw.input_height)
            .field("input_pitch", &self.raw.input_pitch)
            .field("fast_encoding", &self.raw.fast_encoding)
            .field("compute_md5sum", &self.raw.compute_md5sum)
            .field("enable_preview", &self.raw.enable_preview)
            .finish_non_exhaustive()
    }
}

impl Drop for Parameters {
    fn drop(&mut self) {
        let payload = &mut self.raw.gpmf_payload;
        if !payload.buffer.is_null() {
            // Safety: the codec allocated the payload through this
            // operation's allocator pair.
            unsafe { self.allocator.free(payload.buffer.cast()) };
            payload.buffer = std::ptr::null_mut();
            payload.size = 0;
        }
    }
}

/// Dynamic override value supplied by a host runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideValue {
    /// An integer-valued parameter.
    Int(i64),
    /// A boolean-valued parameter.
    Bool(bool),
}

/// Names accepted by [`ParameterOverrides::from_pairs`].
pub const RECOGNIZED_PARAMETERS: [&str; 6] = [
    "input_width",
    "input_height",
    "input_pitch",
    "fast_encoding",
    "compute_md5sum",
    "enable_preview",
];

/// Typed partial update overlaid on [`Parameters`] defaults.
///
/// Fields left as `None` keep their default. Values are validated when
/// the overlay is applied; dynamic construction through
/// [`ParameterOverrides::from_pairs`] additionally rejects unknown
/// names and type mismatches up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    /// Width of the input source in pixels.
    pub input_width: Option<i64>,
    /// Height of the input source in pixels.
    pub input_height: Option<i64>,
    /// Pitch of the input source in pixels.
    pub input_pitch: Option<i64>,
    /// Trade compression ratio for encoding speed.
    pub fast_encoding: Option<bool>,
    /// Compute an MD5 checksum of the raw data.
    pub compute_md5sum: Option<bool>,
    /// Embed a secondary preview image.
    pub enable_preview: Option<bool>,
}

impl ParameterOverrides {
    /// Builds overrides from dynamic `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// An unknown name or a value of the wrong type fails with a
    /// parameter error naming the field and the recognized set.
    pub fn from_pairs<'a, I>(pairs: I) -> GprResult<Self>
    where
        I: IntoIterator<Item = (&'a str, OverrideValue)>,
    {
        let mut overrides = Self::default();
        for (name, value) in pairs {
            match (name, value) {
                ("input_width", OverrideValue::Int(v)) => overrides.input_width = Some(v),
                ("input_height", OverrideValue::Int(v)) => overrides.input_height = Some(v),
                ("input_pitch", OverrideValue::Int(v)) => overrides.input_pitch = Some(v),
                ("fast_encoding", OverrideValue::Bool(v)) => overrides.fast_encoding = Some(v),
                ("compute_md5sum", OverrideValue::Bool(v)) => overrides.compute_md5sum = Some(v),
                ("enable_preview", OverrideValue::Bool(v)) => overrides.enable_preview = Some(v),
                ("input_width" | "input_height" | "input_pitch", OverrideValue::Bool(_)) => {
                    return Err(GprError::parameter(name, "expected an integer value"));
                }
                (
                    "fast_encoding" | "compute_md5sum" | "enable_preview",
                    OverrideValue::Int(_),
                ) => {
                    return Err(GprError::parameter(name, "expected a boolean value"));
                }
                (unknown, _) => {
                    return Err(GprError::parameter(
                        unknown,
                        format!(
                            "unknown parameter; recognized parameters: {}",
                            RECOGNIZED_PARAMETERS.join(", ")
                        ),
                    ));
                }
            }
        }
        Ok(overrides)
    }

    /// Overlays these overrides on `params`, field by field.
    ///
    /// # Errors
    ///
    /// Out-of-range values fail with a parameter error carrying the
    /// field name and the allowed range.
    pub fn apply(&self, params: &mut Parameters) -> GprResult<()> {
        let raw = params.as_raw_mut();
        if let Some(v) = self.input_width {
            raw.input_width = check_dimension("input_width", v)?;
        }
        if let Some(v) = self.input_height {
            raw.input_height = check_dimension("input_height", v)?;
        }
        if let Some(v) = self.input_pitch {
            if v < 1 || v > i64::from(i32::MAX) {
                return Err(GprError::parameter(
                    "input_pitch",
                    format!("value {v} out of range; allowed range: 1..={}", i32::MAX),
                ));
            }
            raw.input_pitch = v as i32;
        }
        if let Some(v) = self.fast_encoding {
            raw.fast_encoding = v;
        }
        if let Some(v) = self.compute_md5sum {
            raw.compute_md5sum = v;
        }
        if let Some(v) = self.enable_preview {
            raw.enable_preview = v;
        }
        Ok(())
    }
}

fn check_dimension(name: &'static str, value: i64) -> GprResult<i32> {
    if (1..=MAX_DIMENSION).contains(&value) {
        Ok(value as i32)
    } else {
        Err(GprError::parameter(
            name,
            format!("value {value} out of range; allowed range: 1..={MAX_DIMENSION}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_codec_contract() {
        let params = Parameters::new(Allocator::global());
        assert_eq!(params.input_width(), 0);
        assert!(!params.fast_encoding());
        assert!(params.enable_preview());
        assert_eq!(params.gpmf_size(), 0);
    }

    #[test]
    fn overlay_applies_only_set_fields() {
        let mut params = Parameters::new(Allocator::global());
        let overrides = ParameterOverrides {
            input_width: Some(640),
            input_height: Some(480),
            fast_encoding: Some(true),
            ..Default::default()
        };
        overrides.apply(&mut params).unwrap();

        assert_eq!(params.input_width(), 640);
        assert_eq!(params.input_height(), 480);
        assert_eq!(params.input_pitch(), 0);
        assert!(params.fast_encoding());
        assert!(params.enable_preview());
    }

    #[test]
    fn unknown_name_is_rejected_with_recognized_set() {
        let err =
            ParameterOverrides::from_pairs([("quality", OverrideValue::Int(12))]).unwrap_err();
        match err {
            GprError::Parameter { name, message } => {
                assert_eq!(name, "quality");
                assert!(message.contains("input_width"));
                assert!(message.contains("enable_preview"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err =
            ParameterOverrides::from_pairs([("fast_encoding", OverrideValue::Int(1))]).unwrap_err();
        assert_eq!(err.code(), Some(-20));
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn out_of_range_dimension_names_field_and_range() {
        let mut params = Parameters::new(Allocator::global());
        let overrides = ParameterOverrides {
            input_height: Some(0),
            ..Default::default()
        };
        let err = overrides.apply(&mut params).unwrap_err();
        match err {
            GprError::Parameter { name, message } => {
                assert_eq!(name, "input_height");
                assert!(message.contains("1..=65535"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_pairs_round_trips_all_fields() {
        let overrides = ParameterOverrides::from_pairs([
            ("input_width", OverrideValue::Int(4000)),
            ("input_height", OverrideValue::Int(3000)),
            ("input_pitch", OverrideValue::Int(8000)),
            ("fast_encoding", OverrideValue::Bool(true)),
            ("compute_md5sum", OverrideValue::Bool(true)),
            ("enable_preview", OverrideValue::Bool(false)),
        ])
        .unwrap();

        let mut params = Parameters::new(Allocator::global());
        overrides.apply(&mut params).unwrap();
        assert_eq!(params.input_width(), 4000);
        assert_eq!(params.input_pitch(), 8000);
        assert!(params.compute_md5sum());
        assert!(!params.enable_preview());
    }
}
