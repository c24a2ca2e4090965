//! In-process codec doubles.

use gpr_core::{
    Allocator, Codec, Conversion, DateTime, ExifInfo, NativeBuffer, Parameters, Rational,
};
use gpr_sys::gpr_buffer;
use serde::{Deserialize, Serialize};

/// Magic prefix of a synthetic GPR container.
pub const GPR_MAGIC: [u8; 4] = *b"GPRC";
/// Magic prefix of a synthetic DNG container.
pub const DNG_MAGIC: [u8; 4] = *b"DNGC";

/// Serializable header of the synthetic container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Header {
    width: i32,
    height: i32,
    camera_make: String,
    camera_model: String,
    camera_serial: String,
    software_version: String,
    user_comment: String,
    image_description: String,
    exposure_time: (u32, u32),
    f_stop_number: (u32, u32),
    aperture: (u32, u32),
    focal_length: (u32, u32),
    iso_speed_rating: u16,
    focal_length_in_35mm_film: u16,
    date_time_original: (u32, u32, u32, u32, u32, u32),
    date_time_digitized: (u32, u32, u32, u32, u32, u32),
}

fn pack_datetime(dt: DateTime) -> (u32, u32, u32, u32, u32, u32) {
    (dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second)
}

fn unpack_datetime(t: (u32, u32, u32, u32, u32, u32)) -> DateTime {
    DateTime {
        year: t.0,
        month: t.1,
        day: t.2,
        hour: t.3,
        minute: t.4,
        second: t.5,
    }
}

impl Header {
    fn from_exif(width: i32, height: i32, exif: &ExifInfo) -> Self {
        Self {
            width,
            height,
            camera_make: exif.camera_make.clone(),
            camera_model: exif.camera_model.clone(),
            camera_serial: exif.camera_serial.clone(),
            software_version: exif.software_version.clone(),
            user_comment: exif.user_comment.clone(),
            image_description: exif.image_description.clone(),
            exposure_time: (exif.exposure_time.numerator, exif.exposure_time.denominator),
            f_stop_number: (exif.f_stop_number.numerator, exif.f_stop_number.denominator),
            aperture: (exif.aperture.numerator, exif.aperture.denominator),
            focal_length: (exif.focal_length.numerator, exif.focal_length.denominator),
            iso_speed_rating: exif.iso_speed_rating,
            focal_length_in_35mm_film: exif.focal_length_in_35mm_film,
            date_time_original: pack_datetime(exif.date_time_original),
            date_time_digitized: pack_datetime(exif.date_time_digitized),
        }
    }

    fn to_exif(&self) -> ExifInfo {
        ExifInfo {
            camera_make: self.camera_make.clone(),
            camera_model: self.camera_model.clone(),
            camera_serial: self.camera_serial.clone(),
            software_version: self.software_version.clone(),
            user_comment: self.user_comment.clone(),
            image_description: self.image_description.clone(),
            exposure_time: Rational::new(self.exposure_time.0, self.exposure_time.1),
            f_stop_number: Rational::new(self.f_stop_number.0, self.f_stop_number.1),
            aperture: Rational::new(self.aperture.0, self.aperture.1),
            focal_length: Rational::new(self.focal_length.0, self.focal_length.1),
            iso_speed_rating: self.iso_speed_rating,
            focal_length_in_35mm_film: self.focal_length_in_35mm_film,
            date_time_original: unpack_datetime(self.date_time_original),
            date_time_digitized: unpack_datetime(self.date_time_digitized),
            ..Default::default()
        }
    }
}

/// A decoded synthetic container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// Image width in pixels.
    pub width: i32,
    /// Image height in pixels.
    pub height: i32,
    /// Embedded metadata.
    pub exif: ExifInfo,
    /// Row-major 16-bit samples.
    pub pixels: Vec<u16>,
}

/// Encodes a synthetic container: magic, CBOR header length, CBOR
/// header, little-endian 16-bit samples.
#[must_use]
pub fn encode_container(magic: [u8; 4], container: &Container) -> Vec<u8> {
    let header = Header::from_exif(container.width, container.height, &container.exif);
    let mut header_bytes = Vec::new();
    ciborium::into_writer(&header, &mut header_bytes)
        .unwrap_or_else(|e| panic!("header serialization failed: {e}"));

    let mut out = Vec::with_capacity(8 + header_bytes.len() + container.pixels.len() * 2);
    out.extend_from_slice(&magic);
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    for sample in &container.pixels {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Decodes a synthetic container, returning its magic and contents.
///
/// Returns `None` for anything malformed: short input, unknown magic,
/// an undecodable header or truncated pixel data.
#[must_use]
pub fn decode_container(bytes: &[u8]) -> Option<([u8; 4], Container)> {
    if bytes.len() < 8 {
        return None;
    }
    let magic: [u8; 4] = bytes[0..4].try_into().ok()?;
    if magic != GPR_MAGIC && magic != DNG_MAGIC {
        return None;
    }
    let header_len = u32::from_le_bytes(bytes[4..8].try_into().ok()?) as usize;
    let pixels_start = 8usize.checked_add(header_len)?;
    if bytes.len() < pixels_start {
        return None;
    }
    let header: Header = ciborium::from_reader(&bytes[8..pixels_start]).ok()?;

    let pixel_bytes = &bytes[pixels_start..];
    if header.width < 0 || header.height < 0 {
        return None;
    }
    let expected = header.width as usize * header.height as usize * 2;
    if pixel_bytes.len() < expected {
        return None;
    }
    let pixels = pixel_bytes[..expected]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    Some((
        magic,
        Container {
            width: header.width,
            height: header.height,
            exif: header.to_exif(),
            pixels,
        },
    ))
}

fn emit(allocator: &Allocator, bytes: &[u8], output: &mut gpr_buffer) -> bool {
    match NativeBuffer::copy_from_slice(*allocator, bytes) {
        Ok(buffer) => {
            *output = buffer.into_raw_parts();
            true
        }
        Err(_) => false,
    }
}

/// Deterministic in-process codec over the synthetic container format.
///
/// Decode paths take geometry and metadata from the input container;
/// encode paths take them from the parameters block, the way the
/// native codec reads back what `gpr_parse_metadata` filled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubCodec;

impl Codec for StubCodec {
    fn convert(
        &self,
        kind: Conversion,
        allocator: &Allocator,
        parameters: &Parameters,
        input: &[u8],
        output: &mut gpr_buffer,
    ) -> bool {
        let Some((magic, container)) = decode_container(input) else {
            return false;
        };
        let expected_magic = match kind {
            Conversion::GprToDng | Conversion::GprToRaw => GPR_MAGIC,
            Conversion::DngToGpr | Conversion::DngToDng => DNG_MAGIC,
        };
        if magic != expected_magic {
            return false;
        }

        let bytes = match kind {
            Conversion::GprToDng => encode_container(DNG_MAGIC, &container),
            Conversion::GprToRaw => container
                .pixels
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect(),
            Conversion::DngToGpr | Conversion::DngToDng => {
                let rewritten = Container {
                    width: parameters.input_width(),
                    height: parameters.input_height(),
                    exif: ExifInfo::from_raw(parameters.exif()),
                    pixels: container.pixels,
                };
                let magic = if kind == Conversion::DngToGpr {
                    GPR_MAGIC
                } else {
                    DNG_MAGIC
                };
                encode_container(magic, &rewritten)
            }
        };
        emit(allocator, &bytes, output)
    }

    fn parse_metadata(
        &self,
        _allocator: &Allocator,
        input: &[u8],
        parameters: &mut Parameters,
    ) -> bool {
        let Some((_, container)) = decode_container(input) else {
            return false;
        };
        parameters.set_geometry(container.width, container.height, container.width);
        container.exif.write_raw(parameters.exif_mut()).is_ok()
    }
}

/// Codec whose entry points allocate scratch output and then report
/// failure, exercising the caller's cleanup of rejected buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCodec;

impl Codec for FailingCodec {
    fn convert(
        &self,
        _kind: Conversion,
        allocator: &Allocator,
        _parameters: &Parameters,
        _input: &[u8],
        output: &mut gpr_buffer,
    ) -> bool {
        // Leave a live allocation behind the failure flag.
        if let Ok(buffer) = NativeBuffer::copy_from_slice(*allocator, &[0u8; 16]) {
            *output = buffer.into_raw_parts();
        }
        false
    }

    fn parse_metadata(&self, _: &Allocator, _: &[u8], _: &mut Parameters) -> bool {
        false
    }
}

/// Codec whose entry points panic, exercising panic containment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingCodec;

impl Codec for PanickingCodec {
    fn convert(
        &self,
        _: Conversion,
        _: &Allocator,
        _: &Parameters,
        _: &[u8],
        _: &mut gpr_buffer,
    ) -> bool {
        panic!("synthetic codec fault")
    }

    fn parse_metadata(&self, _: &Allocator, _: &[u8], _: &mut Parameters) -> bool {
        panic!("synthetic codec fault")
    }
}
