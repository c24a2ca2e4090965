//! Pixel views over decoded raw image data.
//!
//! The raw-extraction path hands back a codec-allocated block of
//! little-endian 16-bit samples. [`RawImage`] takes ownership of that
//! block and exposes it either as a zero-copy `u16` view borrowed from
//! the owner, or as an owned `f32` array normalized to `[0, 1]`. The
//! borrow ties every view to the owner's lifetime, so a view can never
//! outlive the native allocation backing it.

use crate::buffer::NativeBuffer;
use crate::codec::{Codec, Conversion};
use crate::convert::{detect_format, guard_invoke, invoke_convert, validate_input_file, ContainerFormat};
use crate::error::{GprError, GprResult};
use crate::metadata::parse_params;
use crate::alloc::Allocator;
use ndarray::{Array2, ArrayView2};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Sample types a raw image can be materialized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// Native 16-bit samples, exposed zero-copy.
    U16,
    /// 32-bit floats normalized by 1/65535, exposed as an owned copy.
    F32,
}

impl PixelType {
    const SUPPORTED: [&'static str; 2] = ["uint16", "float32"];

    /// Canonical name, matching the `FromStr` spelling.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U16 => "uint16",
            Self::F32 => "float32",
        }
    }
}

impl FromStr for PixelType {
    type Err = GprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uint16" => Ok(Self::U16),
            "float32" => Ok(Self::F32),
            other => Err(GprError::parameter(
                "dtype",
                format!(
                    "unknown pixel type {:?}, supported: {}",
                    other,
                    Self::SUPPORTED.join(", ")
                ),
            )),
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape and storage facts about a container's raw image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Sample planes per pixel; raw sensor data carries one.
    pub channels: u32,
    /// Native sample type of the stored data.
    pub pixel_type: PixelType,
    /// Size of the raw pixel data in bytes.
    pub data_size: usize,
}

/// Reads the image geometry of a GPR or DNG container.
///
/// # Errors
///
/// File validation and metadata-parse failures surface as in
/// [`crate::metadata::read_exif`]; a container reporting non-positive
/// dimensions fails with a format error.
pub fn image_info(codec: &dyn Codec, path: &Path) -> GprResult<ImageInfo> {
    let params = parse_params(codec, path)?;
    let (width, height) = positive_dimensions(params.input_width(), params.input_height())?;
    Ok(ImageInfo {
        width,
        height,
        channels: 1,
        pixel_type: PixelType::U16,
        data_size: width as usize * height as usize * 2,
    })
}

#[allow(clippy::cast_sign_loss)]
fn positive_dimensions(width: i32, height: i32) -> GprResult<(u32, u32)> {
    if width <= 0 || height <= 0 {
        return Err(GprError::format(format!(
            "invalid image dimensions {width}x{height}"
        )));
    }
    Ok((width as u32, height as u32))
}

#[derive(Debug)]
enum Pixels {
    Native(NativeBuffer),
    Normalized(Array2<f32>),
}

/// Owner of one decoded raw image.
///
/// For [`PixelType::U16`] the codec-allocated block is adopted whole
/// and freed when the `RawImage` drops; [`RawImage::as_u16`] borrows
/// it without copying. For [`PixelType::F32`] the samples are copied
/// out, normalized, and the native block is released before the
/// constructor returns.
#[derive(Debug)]
pub struct RawImage {
    width: usize,
    height: usize,
    pixels: Pixels,
}

impl RawImage {
    /// Adopts a codec output block as an image of `height` x `width`.
    ///
    /// # Errors
    ///
    /// Non-positive dimensions, a block shorter than `width * height`
    /// 16-bit samples, or a block misaligned for `u16` access all fail
    /// with a format error; the block is still released by the buffer's
    /// drop in those cases.
    pub fn from_native(
        buffer: NativeBuffer,
        height: i32,
        width: i32,
        pixel_type: PixelType,
    ) -> GprResult<Self> {
        let (width, height) = positive_dimensions(width, height)?;
        let (width, height) = (width as usize, height as usize);
        let expected = width * height * 2;
        if buffer.len() < expected {
            return Err(GprError::format(format!(
                "raw data is {} bytes, {}x{} requires {}",
                buffer.len(),
                width,
                height,
                expected
            )));
        }
        if buffer.as_ptr().align_offset(std::mem::align_of::<u16>()) != 0 {
            return Err(GprError::format(
                "raw data block is misaligned for 16-bit access",
            ));
        }

        let pixels = match pixel_type {
            PixelType::U16 => Pixels::Native(buffer),
            PixelType::F32 => {
                let samples = unsafe { samples_of(&buffer, width * height) };
                let mut normalized = Array2::zeros((height, width));
                for (dst, &src) in normalized.iter_mut().zip(samples) {
                    *dst = f32::from(src) / 65535.0;
                }
                // `buffer` drops here, releasing the native block.
                Pixels::Normalized(normalized)
            }
        };
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// (height, width) pair, the array shape of the views.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Sample type this image was materialized as.
    #[must_use]
    pub fn pixel_type(&self) -> PixelType {
        match self.pixels {
            Pixels::Native(_) => PixelType::U16,
            Pixels::Normalized(_) => PixelType::F32,
        }
    }

    /// Zero-copy view of the native samples.
    ///
    /// Returns `None` when the image was materialized as `f32`. The
    /// view borrows `self`, so the backing allocation outlives it by
    /// construction.
    #[must_use]
    pub fn as_u16(&self) -> Option<ArrayView2<'_, u16>> {
        match &self.pixels {
            Pixels::Native(buffer) => {
                let samples = unsafe { samples_of(buffer, self.width * self.height) };
                ArrayView2::from_shape((self.height, self.width), samples).ok()
            }
            Pixels::Normalized(_) => None,
        }
    }

    /// View of the normalized samples.
    ///
    /// Returns `None` when the image was materialized as `u16`.
    #[must_use]
    pub fn as_f32(&self) -> Option<ArrayView2<'_, f32>> {
        match &self.pixels {
            Pixels::Native(_) => None,
            Pixels::Normalized(array) => Some(array.view()),
        }
    }

    /// Consumes the image into an owned normalized array.
    ///
    /// A `u16` image is converted on the way out; its native block is
    /// released before this returns.
    #[must_use]
    pub fn into_f32(self) -> Array2<f32> {
        match self.pixels {
            Pixels::Normalized(array) => array,
            Pixels::Native(buffer) => {
                let samples = unsafe { samples_of(&buffer, self.width * self.height) };
                let mut normalized = Array2::zeros((self.height, self.width));
                for (dst, &src) in normalized.iter_mut().zip(samples) {
                    *dst = f32::from(src) / 65535.0;
                }
                normalized
            }
        }
    }
}

/// Reinterprets the front of a buffer as `count` 16-bit samples.
///
/// # Safety
///
/// The buffer must hold at least `count * 2` bytes at an address
/// aligned for `u16`; `RawImage::from_native` validates both.
unsafe fn samples_of(buffer: &NativeBuffer, count: usize) -> &[u16] {
    std::slice::from_raw_parts(buffer.as_ptr().cast::<u16>(), count)
}

/// Decodes the raw pixel data of a GPR container.
///
/// Parses the container's metadata for the image geometry, runs the
/// raw-extraction conversion, and materializes the result as `ty`.
///
/// # Errors
///
/// File validation, metadata-parse, conversion and shape failures each
/// map to their typed error.
pub fn raw_pixels(codec: &dyn Codec, path: &Path, ty: PixelType) -> GprResult<RawImage> {
    let format = detect_format(path)?;
    if format != ContainerFormat::Gpr {
        return Err(GprError::UnsupportedFormat {
            format: format.name().to_owned(),
            supported: vec![ContainerFormat::Gpr.name()],
        });
    }
    validate_input_file(path)?;

    let allocator = Allocator::global();
    let input = NativeBuffer::from_file(path, allocator)?;
    let mut params = crate::params::Parameters::new(allocator);
    let ok = guard_invoke("gpr_parse_metadata", || {
        codec.parse_metadata(&allocator, input.as_slice(), &mut params)
    })?;
    if !ok {
        return Err(GprError::conversion("gpr_parse_metadata", path, path));
    }
    let height = params.input_height();
    let width = params.input_width();

    let output = invoke_convert(
        codec,
        Conversion::GprToRaw,
        &allocator,
        &params,
        input.as_slice(),
        path,
        path,
    )?;
    tracing::debug!(
        path = %path.display(),
        width,
        height,
        dtype = ty.name(),
        bytes = output.len(),
        "raw pixels decoded"
    );
    RawImage::from_native(output, height, width, ty)
}

/// High-level handle to one container file.
///
/// Binds a codec to a path so repeated operations on the same file
/// read naturally at call sites; every method re-reads the file, the
/// handle itself holds no decoded state.
#[derive(Clone)]
pub struct GprImage {
    codec: Arc<dyn Codec>,
    path: PathBuf,
}

impl GprImage {
    /// Binds `codec` to the container at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the path does not name a readable, non-empty file of
    /// a recognized container format.
    pub fn open(codec: Arc<dyn Codec>, path: impl Into<PathBuf>) -> GprResult<Self> {
        let path = path.into();
        detect_format(&path)?;
        validate_input_file(&path)?;
        Ok(Self { codec, path })
    }

    /// Path of the underlying container.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image width in pixels, from container metadata.
    ///
    /// # Errors
    ///
    /// See [`image_info`].
    pub fn width(&self) -> GprResult<u32> {
        Ok(image_info(self.codec.as_ref(), &self.path)?.width)
    }

    /// Image height in pixels, from container metadata.
    ///
    /// # Errors
    ///
    /// See [`image_info`].
    pub fn height(&self) -> GprResult<u32> {
        Ok(image_info(self.codec.as_ref(), &self.path)?.height)
    }

    /// (height, width) pair, from container metadata.
    ///
    /// # Errors
    ///
    /// See [`image_info`].
    pub fn dimensions(&self) -> GprResult<(u32, u32)> {
        let info = image_info(self.codec.as_ref(), &self.path)?;
        Ok((info.height, info.width))
    }

    /// Converts this container to a DNG file.
    ///
    /// # Errors
    ///
    /// See [`crate::convert::gpr_to_dng`].
    pub fn to_dng(
        &self,
        output: &Path,
        overrides: &crate::params::ParameterOverrides,
    ) -> GprResult<()> {
        crate::convert::gpr_to_dng(self.codec.as_ref(), &self.path, output, overrides)
    }

    /// Extracts this container's raw pixel data to a file.
    ///
    /// # Errors
    ///
    /// See [`crate::convert::gpr_to_raw`].
    pub fn to_raw(
        &self,
        output: &Path,
        overrides: &crate::params::ParameterOverrides,
    ) -> GprResult<()> {
        crate::convert::gpr_to_raw(self.codec.as_ref(), &self.path, output, overrides)
    }

    /// Decodes this container's raw pixel data in memory.
    ///
    /// # Errors
    ///
    /// See [`raw_pixels`].
    pub fn raw_pixels(&self, ty: PixelType) -> GprResult<RawImage> {
        raw_pixels(self.codec.as_ref(), &self.path, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_image(width: usize, height: usize) -> NativeBuffer {
        let samples: Vec<u16> = (0..width * height).map(|i| i as u16).collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        NativeBuffer::copy_from_slice(Allocator::global(), &bytes).unwrap()
    }

    #[test]
    fn pixel_type_parses_known_names() {
        assert_eq!("uint16".parse::<PixelType>().unwrap(), PixelType::U16);
        assert_eq!("float32".parse::<PixelType>().unwrap(), PixelType::F32);
    }

    #[test]
    fn pixel_type_rejects_unknown_names() {
        let err = "int8".parse::<PixelType>().unwrap_err();
        assert_eq!(err.code(), Some(-20));
        let message = err.to_string();
        assert!(message.contains("dtype"));
        assert!(message.contains("uint16"));
        assert!(message.contains("float32"));
    }

    #[test]
    fn u16_view_is_zero_copy_and_shaped() {
        let image = RawImage::from_native(native_image(4, 3), 3, 4, PixelType::U16).unwrap();
        assert_eq!(image.dimensions(), (3, 4));
        assert_eq!(image.pixel_type(), PixelType::U16);

        let view = image.as_u16().unwrap();
        assert_eq!(view.shape(), [3, 4]);
        assert_eq!(view[[0, 0]], 0);
        assert_eq!(view[[2, 3]], 11);
        assert!(image.as_f32().is_none());
    }

    #[test]
    fn f32_image_is_normalized() {
        let bytes = 65535u16.to_le_bytes().repeat(6);
        let buffer = NativeBuffer::copy_from_slice(Allocator::global(), &bytes).unwrap();
        let image = RawImage::from_native(buffer, 2, 3, PixelType::F32).unwrap();
        assert_eq!(image.pixel_type(), PixelType::F32);
        assert!(image.as_u16().is_none());

        let view = image.as_f32().unwrap();
        assert_eq!(view.shape(), [2, 3]);
        assert!((view[[1, 2]] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn into_f32_converts_native_samples() {
        let image = RawImage::from_native(native_image(2, 2), 2, 2, PixelType::U16).unwrap();
        let array = image.into_f32();
        assert_eq!(array.shape(), [2, 2]);
        assert!((array[[0, 1]] - 1.0 / 65535.0).abs() < f32::EPSILON);
    }

    #[test]
    fn short_buffer_is_a_format_error() {
        let err = RawImage::from_native(native_image(2, 2), 4, 4, PixelType::U16).unwrap_err();
        assert_eq!(err.code(), Some(-30));
    }

    #[test]
    fn non_positive_dimensions_are_format_errors() {
        let err = RawImage::from_native(native_image(2, 2), 0, 2, PixelType::U16).unwrap_err();
        assert_eq!(err.code(), Some(-30));
        let err = RawImage::from_native(native_image(2, 2), 2, -1, PixelType::U16).unwrap_err();
        assert_eq!(err.code(), Some(-30));
    }
}
