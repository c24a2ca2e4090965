//! Typed metadata model and metadata operations.
//!
//! Exposure values are exact fractions ([`Rational`]) with derived
//! decimal accessors, so round-tripping metadata through the codec
//! never loses precision to floating point. The raw `gpr_exif_info`
//! block is decoded into [`ExifInfo`] and written back from either an
//! [`ExifInfo`] or a partial [`ExifUpdate`].

use crate::alloc::Allocator;
use crate::buffer::NativeBuffer;
use crate::codec::{Codec, Conversion};
use crate::convert::{detect_format, guard_invoke, invoke_convert, validate_input_file, ContainerFormat};
use crate::error::{GprError, GprResult};
use crate::params::Parameters;
use gpr_sys::{
    gpr_date_and_time, gpr_exif_info, gpr_gps_info, gpr_signed_rational, gpr_unsigned_rational,
};
use std::os::raw::c_char;
use std::path::Path;

/// Unsigned exact fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rational {
    /// Fraction numerator.
    pub numerator: u32,
    /// Fraction denominator.
    pub denominator: u32,
}

impl Rational {
    /// Creates a fraction.
    #[must_use]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Derived decimal value; zero when the denominator is zero.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            f64::from(self.numerator) / f64::from(self.denominator)
        }
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<gpr_unsigned_rational> for Rational {
    fn from(r: gpr_unsigned_rational) -> Self {
        Self::new(r.numerator, r.denominator)
    }
}

impl From<Rational> for gpr_unsigned_rational {
    fn from(r: Rational) -> Self {
        Self {
            numerator: r.numerator,
            denominator: r.denominator,
        }
    }
}

/// Signed exact fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedRational {
    /// Fraction numerator.
    pub numerator: i32,
    /// Fraction denominator.
    pub denominator: i32,
}

impl SignedRational {
    /// Creates a fraction.
    #[must_use]
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Derived decimal value; zero when the denominator is zero.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            f64::from(self.numerator) / f64::from(self.denominator)
        }
    }
}

impl From<gpr_signed_rational> for SignedRational {
    fn from(r: gpr_signed_rational) -> Self {
        Self::new(r.numerator, r.denominator)
    }
}

impl From<SignedRational> for gpr_signed_rational {
    fn from(r: SignedRational) -> Self {
        Self {
            numerator: r.numerator,
            denominator: r.denominator,
        }
    }
}

/// Capture timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    /// Four-digit year.
    pub year: u32,
    /// Month, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
    /// Hour, 0-23.
    pub hour: u32,
    /// Minute, 0-59.
    pub minute: u32,
    /// Second, 0-59.
    pub second: u32,
}

impl DateTime {
    /// Validates calendar ranges.
    ///
    /// # Errors
    ///
    /// Fails with a parameter error naming `field` when a component is
    /// out of range.
    pub fn validate(&self, field: &str) -> GprResult<()> {
        let checks = [
            (self.year <= 9999, "year must be at most 9999"),
            ((1..=12).contains(&self.month), "month must be in 1..=12"),
            ((1..=31).contains(&self.day), "day must be in 1..=31"),
            (self.hour <= 23, "hour must be in 0..=23"),
            (self.minute <= 59, "minute must be in 0..=59"),
            (self.second <= 59, "second must be in 0..=59"),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(GprError::parameter(field, message));
            }
        }
        Ok(())
    }
}

impl From<gpr_date_and_time> for DateTime {
    fn from(d: gpr_date_and_time) -> Self {
        Self {
            year: d.year,
            month: d.month,
            day: d.day,
            hour: d.hour,
            minute: d.minute,
            second: d.second,
        }
    }
}

impl From<DateTime> for gpr_date_and_time {
    fn from(d: DateTime) -> Self {
        Self {
            year: d.year,
            month: d.month,
            day: d.day,
            hour: d.hour,
            minute: d.minute,
            second: d.second,
        }
    }
}

/// One GPS coordinate in degrees/minutes/seconds form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsCoordinate {
    /// Whole degrees.
    pub degrees: Rational,
    /// Minutes of arc.
    pub minutes: Rational,
    /// Seconds of arc.
    pub seconds: Rational,
    /// Hemisphere reference: 'N', 'S', 'E' or 'W'.
    pub reference: char,
}

impl GpsCoordinate {
    /// Signed decimal degrees; negative for 'S' and 'W'.
    #[must_use]
    pub fn decimal_degrees(&self) -> f64 {
        let magnitude = self.degrees.value() + self.minutes.value() / 60.0
            + self.seconds.value() / 3600.0;
        match self.reference {
            'S' | 'W' => -magnitude,
            _ => magnitude,
        }
    }
}

/// GPS fix embedded in the EXIF payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsInfo {
    /// Latitude coordinate.
    pub latitude: GpsCoordinate,
    /// Longitude coordinate.
    pub longitude: GpsCoordinate,
    /// Altitude in meters.
    pub altitude: Rational,
    /// True when the altitude is below sea level.
    pub below_sea_level: bool,
    /// UTC time of fix as hour/minute/second fractions.
    pub time_stamp: [Rational; 3],
    /// UTC date of fix, "YYYY:MM:DD".
    pub date_stamp: String,
}

/// Decoded EXIF metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifInfo {
    /// Camera manufacturer.
    pub camera_make: String,
    /// Camera model.
    pub camera_model: String,
    /// Camera serial number.
    pub camera_serial: String,
    /// Firmware/software version.
    pub software_version: String,
    /// Free-form user comment.
    pub user_comment: String,
    /// Image description.
    pub image_description: String,
    /// Exposure time in seconds.
    pub exposure_time: Rational,
    /// F-stop number.
    pub f_stop_number: Rational,
    /// Lens aperture.
    pub aperture: Rational,
    /// Focal length in millimeters.
    pub focal_length: Rational,
    /// Exposure bias.
    pub exposure_bias: SignedRational,
    /// Digital zoom ratio.
    pub digital_zoom: Rational,
    /// ISO speed rating.
    pub iso_speed_rating: u16,
    /// Focal length in 35mm-film terms.
    pub focal_length_in_35mm_film: u16,
    /// EXIF exposure program code.
    pub exposure_program: u16,
    /// EXIF metering mode code.
    pub metering_mode: u16,
    /// EXIF light source code.
    pub light_source: u16,
    /// EXIF flash state code.
    pub flash: u16,
    /// EXIF sharpness code.
    pub sharpness: u16,
    /// EXIF saturation code.
    pub saturation: u16,
    /// EXIF contrast code.
    pub contrast: u16,
    /// EXIF white balance code.
    pub white_balance: u16,
    /// EXIF scene capture type code.
    pub scene_capture_type: u16,
    /// EXIF sensing method code.
    pub sensing_method: u16,
    /// EXIF file source code.
    pub file_source: u16,
    /// EXIF scene type code.
    pub scene_type: u16,
    /// Original capture timestamp.
    pub date_time_original: DateTime,
    /// Digitization timestamp.
    pub date_time_digitized: DateTime,
    /// GPS fix, when present.
    pub gps: Option<GpsInfo>,
}

impl ExifInfo {
    /// Exposure time as a derived decimal, in seconds.
    #[must_use]
    pub fn exposure_seconds(&self) -> f64 {
        self.exposure_time.value()
    }

    /// F-number as a derived decimal.
    #[must_use]
    pub fn f_number(&self) -> f64 {
        self.f_stop_number.value()
    }

    /// Decodes a raw EXIF block.
    #[must_use]
    pub fn from_raw(raw: &gpr_exif_info) -> Self {
        Self {
            camera_make: fixed_to_string(&raw.camera_make),
            camera_model: fixed_to_string(&raw.camera_model),
            camera_serial: fixed_to_string(&raw.camera_serial),
            software_version: fixed_to_string(&raw.software_version),
            user_comment: fixed_to_string(&raw.user_comment),
            image_description: fixed_to_string(&raw.image_description),
            exposure_time: raw.exposure_time.into(),
            f_stop_number: raw.f_stop_number.into(),
            aperture: raw.aperture.into(),
            focal_length: raw.focal_length.into(),
            exposure_bias: raw.exposure_bias.into(),
            digital_zoom: raw.digital_zoom.into(),
            iso_speed_rating: raw.iso_speed_rating,
            focal_length_in_35mm_film: raw.focal_length_in_35mm_film,
            exposure_program: raw.exposure_program,
            metering_mode: raw.metering_mode,
            light_source: raw.light_source,
            flash: raw.flash,
            sharpness: raw.sharpness,
            saturation: raw.saturation,
            contrast: raw.contrast,
            white_balance: raw.white_balance,
            scene_capture_type: raw.scene_capture_type,
            sensing_method: raw.sensing_method,
            file_source: raw.file_source,
            scene_type: raw.scene_type,
            date_time_original: raw.date_time_original.into(),
            date_time_digitized: raw.date_time_digitized.into(),
            gps: decode_gps(&raw.gps_info),
        }
    }

    /// Encodes this metadata into a raw EXIF block.
    ///
    /// # Errors
    ///
    /// Fails with a parameter error when a string exceeds its field
    /// capacity in the native block.
    pub fn write_raw(&self, raw: &mut gpr_exif_info) -> GprResult<()> {
        write_fixed(&mut raw.camera_make, &self.camera_make, "camera_make")?;
        write_fixed(&mut raw.camera_model, &self.camera_model, "camera_model")?;
        write_fixed(&mut raw.camera_serial, &self.camera_serial, "camera_serial")?;
        write_fixed(
            &mut raw.software_version,
            &self.software_version,
            "software_version",
        )?;
        write_fixed(&mut raw.user_comment, &self.user_comment, "user_comment")?;
        write_fixed(
            &mut raw.image_description,
            &self.image_description,
            "image_description",
        )?;
        raw.exposure_time = self.exposure_time.into();
        raw.f_stop_number = self.f_stop_number.into();
        raw.aperture = self.aperture.into();
        raw.focal_length = self.focal_length.into();
        raw.exposure_bias = self.exposure_bias.into();
        raw.digital_zoom = self.digital_zoom.into();
        raw.iso_speed_rating = self.iso_speed_rating;
        raw.focal_length_in_35mm_film = self.focal_length_in_35mm_film;
        raw.exposure_program = self.exposure_program;
        raw.metering_mode = self.metering_mode;
        raw.light_source = self.light_source;
        raw.flash = self.flash;
        raw.sharpness = self.sharpness;
        raw.saturation = self.saturation;
        raw.contrast = self.contrast;
        raw.white_balance = self.white_balance;
        raw.scene_capture_type = self.scene_capture_type;
        raw.sensing_method = self.sensing_method;
        raw.file_source = self.file_source;
        raw.scene_type = self.scene_type;
        raw.date_time_original = self.date_time_original.into();
        raw.date_time_digitized = self.date_time_digitized.into();
        encode_gps(self.gps.as_ref(), &mut raw.gps_info)?;
        Ok(())
    }
}

/// Typed partial metadata update.
///
/// Fields left as `None` keep the value already present in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifUpdate {
    /// Camera manufacturer.
    pub camera_make: Option<String>,
    /// Camera model.
    pub camera_model: Option<String>,
    /// Camera serial number.
    pub camera_serial: Option<String>,
    /// Firmware/software version.
    pub software_version: Option<String>,
    /// Free-form user comment.
    pub user_comment: Option<String>,
    /// Image description.
    pub image_description: Option<String>,
    /// Exposure time in seconds.
    pub exposure_time: Option<Rational>,
    /// F-stop number.
    pub f_stop_number: Option<Rational>,
    /// Lens aperture.
    pub aperture: Option<Rational>,
    /// Focal length in millimeters.
    pub focal_length: Option<Rational>,
    /// ISO speed rating.
    pub iso_speed_rating: Option<u16>,
    /// Focal length in 35mm-film terms.
    pub focal_length_in_35mm_film: Option<u16>,
    /// Original capture timestamp.
    pub date_time_original: Option<DateTime>,
    /// Digitization timestamp.
    pub date_time_digitized: Option<DateTime>,
}

impl ExifUpdate {
    /// Validates every set field.
    ///
    /// # Errors
    ///
    /// Fails with a parameter error naming the offending field for
    /// oversized strings, zero denominators or invalid timestamps.
    pub fn validate(&self) -> GprResult<()> {
        check_capacity(self.camera_make.as_deref(), 32, "camera_make")?;
        check_capacity(self.camera_model.as_deref(), 32, "camera_model")?;
        check_capacity(self.camera_serial.as_deref(), 32, "camera_serial")?;
        check_capacity(self.software_version.as_deref(), 32, "software_version")?;
        check_capacity(self.user_comment.as_deref(), 64, "user_comment")?;
        check_capacity(self.image_description.as_deref(), 64, "image_description")?;
        check_denominator(self.exposure_time, "exposure_time")?;
        check_denominator(self.f_stop_number, "f_stop_number")?;
        check_denominator(self.aperture, "aperture")?;
        check_denominator(self.focal_length, "focal_length")?;
        if let Some(dt) = self.date_time_original {
            dt.validate("date_time_original")?;
        }
        if let Some(dt) = self.date_time_digitized {
            dt.validate("date_time_digitized")?;
        }
        Ok(())
    }

    /// Overlays the set fields on a raw EXIF block.
    pub(crate) fn apply_raw(&self, raw: &mut gpr_exif_info) -> GprResult<()> {
        if let Some(v) = self.camera_make.as_deref() {
            write_fixed(&mut raw.camera_make, v, "camera_make")?;
        }
        if let Some(v) = self.camera_model.as_deref() {
            write_fixed(&mut raw.camera_model, v, "camera_model")?;
        }
        if let Some(v) = self.camera_serial.as_deref() {
            write_fixed(&mut raw.camera_serial, v, "camera_serial")?;
        }
        if let Some(v) = self.software_version.as_deref() {
            write_fixed(&mut raw.software_version, v, "software_version")?;
        }
        if let Some(v) = self.user_comment.as_deref() {
            write_fixed(&mut raw.user_comment, v, "user_comment")?;
        }
        if let Some(v) = self.image_description.as_deref() {
            write_fixed(&mut raw.image_description, v, "image_description")?;
        }
        if let Some(v) = self.exposure_time {
            raw.exposure_time = v.into();
        }
        if let Some(v) = self.f_stop_number {
            raw.f_stop_number = v.into();
        }
        if let Some(v) = self.aperture {
            raw.aperture = v.into();
        }
        if let Some(v) = self.focal_length {
            raw.focal_length = v.into();
        }
        if let Some(v) = self.iso_speed_rating {
            raw.iso_speed_rating = v;
        }
        if let Some(v) = self.focal_length_in_35mm_film {
            raw.focal_length_in_35mm_film = v;
        }
        if let Some(v) = self.date_time_original {
            raw.date_time_original = v.into();
        }
        if let Some(v) = self.date_time_digitized {
            raw.date_time_digitized = v.into();
        }
        Ok(())
    }
}

impl From<&ExifInfo> for ExifUpdate {
    /// Captures the updatable subset of an extracted metadata record,
    /// convenient for write-back round trips.
    fn from(info: &ExifInfo) -> Self {
        Self {
            camera_make: Some(info.camera_make.clone()),
            camera_model: Some(info.camera_model.clone()),
            camera_serial: Some(info.camera_serial.clone()),
            software_version: Some(info.software_version.clone()),
            user_comment: Some(info.user_comment.clone()),
            image_description: Some(info.image_description.clone()),
            exposure_time: Some(info.exposure_time),
            f_stop_number: Some(info.f_stop_number),
            aperture: Some(info.aperture),
            focal_length: Some(info.focal_length),
            iso_speed_rating: Some(info.iso_speed_rating),
            focal_length_in_35mm_film: Some(info.focal_length_in_35mm_film),
            date_time_original: Some(info.date_time_original),
            date_time_digitized: Some(info.date_time_digitized),
        }
    }
}

/// GPR-specific container information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileInfo {
    /// Width of the raw source in pixels.
    pub input_width: i32,
    /// Height of the raw source in pixels.
    pub input_height: i32,
    /// Pitch of the raw source in pixels.
    pub input_pitch: i32,
    /// Whether the container was encoded in fast mode.
    pub fast_encoding: bool,
    /// Whether an MD5 checksum was recorded.
    pub compute_md5sum: bool,
    /// Whether a preview image is embedded.
    pub enable_preview: bool,
    /// Size of the GPMF telemetry payload in bytes.
    pub gpmf_size: usize,
}

fn fixed_to_string(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn write_fixed(dst: &mut [c_char], value: &str, field: &str) -> GprResult<()> {
    let bytes = value.as_bytes();
    // One slot is reserved for the NUL terminator.
    if bytes.len() >= dst.len() {
        return Err(GprError::parameter(
            field,
            format!(
                "value is {} bytes, maximum length is {}",
                bytes.len(),
                dst.len() - 1
            ),
        ));
    }
    for (slot, &b) in dst.iter_mut().zip(bytes) {
        *slot = b as c_char;
    }
    for slot in dst.iter_mut().skip(bytes.len()) {
        *slot = 0;
    }
    Ok(())
}

fn check_capacity(value: Option<&str>, capacity: usize, field: &str) -> GprResult<()> {
    match value {
        Some(v) if v.len() >= capacity => Err(GprError::parameter(
            field,
            format!(
                "value is {} bytes, maximum length is {}",
                v.len(),
                capacity - 1
            ),
        )),
        _ => Ok(()),
    }
}

fn check_denominator(value: Option<Rational>, field: &str) -> GprResult<()> {
    match value {
        Some(r) if r.denominator == 0 => Err(GprError::parameter(
            field,
            "denominator must be non-zero",
        )),
        _ => Ok(()),
    }
}

fn decode_gps(raw: &gpr_gps_info) -> Option<GpsInfo> {
    if !raw.gps_info_valid {
        return None;
    }
    let reference = |field: &[c_char; 2], default| {
        if field[0] == 0 {
            default
        } else {
            field[0] as u8 as char
        }
    };
    Some(GpsInfo {
        latitude: GpsCoordinate {
            degrees: raw.latitude[0].into(),
            minutes: raw.latitude[1].into(),
            seconds: raw.latitude[2].into(),
            reference: reference(&raw.latitude_ref, 'N'),
        },
        longitude: GpsCoordinate {
            degrees: raw.longitude[0].into(),
            minutes: raw.longitude[1].into(),
            seconds: raw.longitude[2].into(),
            reference: reference(&raw.longitude_ref, 'E'),
        },
        altitude: raw.altitude.into(),
        below_sea_level: raw.altitude_ref == 1,
        time_stamp: [
            raw.time_stamp[0].into(),
            raw.time_stamp[1].into(),
            raw.time_stamp[2].into(),
        ],
        date_stamp: fixed_to_string(&raw.date_stamp),
    })
}

fn encode_gps(gps: Option<&GpsInfo>, raw: &mut gpr_gps_info) -> GprResult<()> {
    let Some(gps) = gps else {
        *raw = gpr_gps_info::default();
        return Ok(());
    };
    raw.gps_info_valid = true;
    raw.latitude = [
        gps.latitude.degrees.into(),
        gps.latitude.minutes.into(),
        gps.latitude.seconds.into(),
    ];
    raw.latitude_ref = [gps.latitude.reference as c_char, 0];
    raw.longitude = [
        gps.longitude.degrees.into(),
        gps.longitude.minutes.into(),
        gps.longitude.seconds.into(),
    ];
    raw.longitude_ref = [gps.longitude.reference as c_char, 0];
    raw.altitude = gps.altitude.into();
    raw.altitude_ref = u8::from(gps.below_sea_level);
    raw.time_stamp = [
        gps.time_stamp[0].into(),
        gps.time_stamp[1].into(),
        gps.time_stamp[2].into(),
    ];
    write_fixed(&mut raw.date_stamp, &gps.date_stamp, "gps_date_stamp")?;
    Ok(())
}

pub(crate) fn parse_params(codec: &dyn Codec, path: &Path) -> GprResult<Parameters> {
    validate_input_file(path)?;
    let allocator = Allocator::global();
    let input = NativeBuffer::from_file(path, allocator)?;
    let mut params = Parameters::new(allocator);

    tracing::debug!(path = %path.display(), bytes = input.len(), "parsing metadata");
    let ok = guard_invoke("gpr_parse_metadata", || {
        codec.parse_metadata(&allocator, input.as_slice(), &mut params)
    })?;
    if !ok {
        return Err(GprError::conversion("gpr_parse_metadata", path, path));
    }
    Ok(params)
}

/// Extracts the EXIF metadata of a GPR or DNG container.
///
/// # Errors
///
/// File validation failures map to the file-error codes; a codec
/// failure flag maps to a conversion error naming the entry point.
pub fn read_exif(codec: &dyn Codec, path: &Path) -> GprResult<ExifInfo> {
    let params = parse_params(codec, path)?;
    Ok(ExifInfo::from_raw(params.exif()))
}

/// Extracts the GPR-specific information of a container.
///
/// # Errors
///
/// Same surface as [`read_exif`].
pub fn read_profile(codec: &dyn Codec, path: &Path) -> GprResult<ProfileInfo> {
    let params = parse_params(codec, path)?;
    Ok(ProfileInfo {
        input_width: params.input_width(),
        input_height: params.input_height(),
        input_pitch: params.input_pitch(),
        fast_encoding: params.fast_encoding(),
        compute_md5sum: params.compute_md5sum(),
        enable_preview: params.enable_preview(),
        gpmf_size: params.gpmf_size(),
    })
}

/// Rewrites a DNG container with updated metadata.
///
/// Parses the existing metadata, overlays the set fields of `update`
/// and re-invokes the codec's DNG write path, persisting the result
/// atomically at `output`.
///
/// # Errors
///
/// Non-DNG inputs fail with an unsupported-format error; the rest of
/// the surface matches [`crate::convert::convert_file`].
pub fn update_exif(
    codec: &dyn Codec,
    input: &Path,
    output: &Path,
    update: &ExifUpdate,
) -> GprResult<()> {
    update.validate()?;
    let format = detect_format(input)?;
    if format != ContainerFormat::Dng {
        return Err(GprError::UnsupportedFormat {
            format: format.name().to_owned(),
            supported: vec![ContainerFormat::Dng.name()],
        });
    }
    validate_input_file(input)?;

    let allocator = Allocator::global();
    let source = NativeBuffer::from_file(input, allocator)?;
    let mut params = Parameters::new(allocator);

    let ok = guard_invoke("gpr_parse_metadata", || {
        codec.parse_metadata(&allocator, source.as_slice(), &mut params)
    })?;
    if !ok {
        return Err(GprError::conversion("gpr_parse_metadata", input, input));
    }

    update.apply_raw(params.exif_mut())?;

    let rewritten = invoke_convert(
        codec,
        Conversion::DngToDng,
        &allocator,
        &params,
        source.as_slice(),
        input,
        output,
    )?;
    rewritten.write_to_file(output)?;
    tracing::debug!(input = %input.display(), output = %output.display(), "metadata rewritten");
    Ok(())
}
