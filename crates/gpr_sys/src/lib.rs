//! # gpr_sys
//!
//! Raw C ABI surface of the GPR (General Purpose Raw) codec library.
//!
//! This crate provides:
//! - `#[repr(C)]` mirrors of the structures exchanged with `libgpr`
//! - Function-pointer aliases for the codec entry points
//! - [`GprLibrary`], a runtime loader that resolves the entry points
//!   via `dlopen` so downstream crates build and test without the
//!   native library installed
//!
//! No memory-management policy lives here; ownership rules are defined
//! by `gpr_core` on top of these types.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![warn(missing_docs)]

use libc::{c_char, c_void};

mod library;

pub use library::{GprLibrary, LoadError};

/// Allocation callback: returns a block of `size` bytes or null.
pub type gpr_malloc_fn = unsafe extern "C" fn(size: usize) -> *mut c_void;

/// Deallocation callback for pointers returned by the paired allocator.
pub type gpr_free_fn = unsafe extern "C" fn(p: *mut c_void);

/// Matched allocate/free pair used for all memory of one operation.
///
/// The native library calls `Alloc` for every buffer it hands back and
/// expects the caller to release through the matching `Free`. Mixing
/// allocators across one buffer is undefined behavior in the codec.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct gpr_allocator {
    /// Allocation entry point.
    pub Alloc: gpr_malloc_fn,
    /// Deallocation entry point.
    pub Free: gpr_free_fn,
}

/// A contiguous memory block plus its size, passed across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpr_buffer {
    /// Start of the block, or null for the empty buffer.
    pub buffer: *mut c_void,
    /// Size of the block in bytes.
    pub size: usize,
}

impl gpr_buffer {
    /// The null buffer, used to initialize codec out-parameters.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            buffer: std::ptr::null_mut(),
            size: 0,
        }
    }

    /// Returns true if the buffer pointer is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.buffer.is_null()
    }
}

impl Default for gpr_buffer {
    fn default() -> Self {
        Self::empty()
    }
}

/// Unsigned exact fraction (EXIF rational).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct gpr_unsigned_rational {
    /// Fraction numerator.
    pub numerator: u32,
    /// Fraction denominator.
    pub denominator: u32,
}

/// Signed exact fraction (EXIF srational).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct gpr_signed_rational {
    /// Fraction numerator.
    pub numerator: i32,
    /// Fraction denominator.
    pub denominator: i32,
}

/// Capture timestamp broken into calendar fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct gpr_date_and_time {
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

/// GPS block embedded in the EXIF payload.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpr_gps_info {
    /// Whether the remaining fields hold a fix.
    pub gps_info_valid: bool,
    /// GPS tag version.
    pub version_id: u32,
    /// "N" or "S".
    pub latitude_ref: [c_char; 2],
    /// Degrees, minutes, seconds.
    pub latitude: [gpr_unsigned_rational; 3],
    /// "E" or "W".
    pub longitude_ref: [c_char; 2],
    /// Degrees, minutes, seconds.
    pub longitude: [gpr_unsigned_rational; 3],
    /// 0 above sea level, 1 below.
    pub altitude_ref: u8,
    /// Altitude in meters.
    pub altitude: gpr_unsigned_rational,
    /// UTC time of fix: hours, minutes, seconds.
    pub time_stamp: [gpr_unsigned_rational; 3],
    /// UTC date of fix, "YYYY:MM:DD" plus terminator.
    pub date_stamp: [c_char; 11],
}

impl Default for gpr_gps_info {
    fn default() -> Self {
        Self {
            gps_info_valid: false,
            version_id: 0,
            latitude_ref: [0; 2],
            latitude: [gpr_unsigned_rational::default(); 3],
            longitude_ref: [0; 2],
            longitude: [gpr_unsigned_rational::default(); 3],
            altitude_ref: 0,
            altitude: gpr_unsigned_rational::default(),
            time_stamp: [gpr_unsigned_rational::default(); 3],
            date_stamp: [0; 11],
        }
    }
}

/// EXIF metadata block carried inside [`gpr_parameters`].
///
/// Field semantics follow the EXIF standard; the bridge only moves the
/// values, it does not interpret them.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpr_exif_info {
    /// Camera manufacturer, NUL-terminated.
    pub camera_make: [c_char; 32],
    /// Camera model, NUL-terminated.
    pub camera_model: [c_char; 32],
    /// Camera serial number, NUL-terminated.
    pub camera_serial: [c_char; 32],
    /// Firmware/software version, NUL-terminated.
    pub software_version: [c_char; 32],
    /// Free-form user comment, NUL-terminated.
    pub user_comment: [c_char; 64],
    /// Image description, NUL-terminated.
    pub image_description: [c_char; 64],
    /// Exposure time in seconds.
    pub exposure_time: gpr_unsigned_rational,
    /// F-stop number.
    pub f_stop_number: gpr_unsigned_rational,
    /// Lens aperture.
    pub aperture: gpr_unsigned_rational,
    /// Focal length in millimeters.
    pub focal_length: gpr_unsigned_rational,
    /// Exposure bias.
    pub exposure_bias: gpr_signed_rational,
    /// Digital zoom ratio.
    pub digital_zoom: gpr_unsigned_rational,
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
    pub date_time_original: gpr_date_and_time,
    /// Digitization timestamp.
    pub date_time_digitized: gpr_date_and_time,
    /// Optional GPS block.
    pub gps_info: gpr_gps_info,
}

impl Default for gpr_exif_info {
    fn default() -> Self {
        Self {
            camera_make: [0; 32],
            camera_model: [0; 32],
            camera_serial: [0; 32],
            software_version: [0; 32],
            user_comment: [0; 64],
            image_description: [0; 64],
            exposure_time: gpr_unsigned_rational::default(),
            f_stop_number: gpr_unsigned_rational::default(),
            aperture: gpr_unsigned_rational::default(),
            focal_length: gpr_unsigned_rational::default(),
            exposure_bias: gpr_signed_rational::default(),
            digital_zoom: gpr_unsigned_rational {
                numerator: 1,
                denominator: 1,
            },
            iso_speed_rating: 0,
            focal_length_in_35mm_film: 0,
            exposure_program: 0,
            metering_mode: 0,
            light_source: 0,
            flash: 0,
            sharpness: 0,
            saturation: 0,
            contrast: 0,
            white_balance: 0,
            scene_capture_type: 0,
            sensing_method: 0,
            file_source: 0,
            scene_type: 0,
            date_time_original: gpr_date_and_time::default(),
            date_time_digitized: gpr_date_and_time::default(),
            gps_info: gpr_gps_info::default(),
        }
    }
}

/// GPMF telemetry payload attached to a GPR container.
///
/// When the codec parses metadata it may allocate this buffer through
/// the operation's allocator; the owner of the parameters must release
/// it through the same allocator.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpr_gpmf_payload {
    /// Payload bytes, or null when absent.
    pub buffer: *mut c_void,
    /// Payload size in bytes.
    pub size: usize,
}

impl Default for gpr_gpmf_payload {
    fn default() -> Self {
        Self {
            buffer: std::ptr::null_mut(),
            size: 0,
        }
    }
}

/// Operation configuration handed to every codec entry point.
///
/// Created with defaults, optionally mutated before the call, and
/// destroyed exactly once afterwards.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gpr_parameters {
    /// Width of the input source in pixels.
    pub input_width: i32,
    /// Height of the input source in pixels.
    pub input_height: i32,
    /// Pitch of the input source in pixels.
    pub input_pitch: i32,
    /// Trade compression ratio for encoding speed.
    pub fast_encoding: bool,
    /// Compute an MD5 checksum of the raw data for verification.
    pub compute_md5sum: bool,
    /// Embed a secondary preview image.
    pub enable_preview: bool,
    /// Telemetry payload, allocator-owned.
    pub gpmf_payload: gpr_gpmf_payload,
    /// Embedded EXIF metadata.
    pub exif_info: gpr_exif_info,
}

impl Default for gpr_parameters {
    /// Mirrors the native `gpr_parameters_set_defaults`.
    fn default() -> Self {
        Self {
            input_width: 0,
            input_height: 0,
            input_pitch: 0,
            fast_encoding: false,
            compute_md5sum: false,
            enable_preview: true,
            gpmf_payload: gpr_gpmf_payload::default(),
            exif_info: gpr_exif_info::default(),
        }
    }
}

/// Container conversion entry point taking operation parameters.
///
/// Covers `gpr_convert_gpr_to_dng`, `gpr_convert_dng_to_gpr`,
/// `gpr_convert_gpr_to_raw` and `gpr_convert_dng_to_dng`: reads the
/// input buffer, allocates the output through the provided allocator
/// and reports success as a boolean.
pub type gpr_convert_fn = unsafe extern "C" fn(
    allocator: *const gpr_allocator,
    parameters: *const gpr_parameters,
    input: *const gpr_buffer,
    output: *mut gpr_buffer,
) -> bool;

/// Metadata extraction entry point.
///
/// Parses the container in `input` and fills `parameters` (geometry,
/// EXIF block, GPMF payload). Boolean success.
pub type gpr_parse_metadata_fn = unsafe extern "C" fn(
    allocator: *const gpr_allocator,
    input: *mut gpr_buffer,
    parameters: *mut gpr_parameters,
) -> bool;
