//! Python bindings for the gpr-rs codec bridge.
//!
//! This crate provides Python bindings using PyO3. The native codec
//! library is loaded once per process, on first use or explicitly via
//! `load_library`. Errors surface as a small exception hierarchy keyed
//! by the Rust error taxonomy, each carrying the taxonomy code in its
//! second argument.

use gpr_core::{
    DateTime, ErrorKind, ExifInfo, ExifUpdate, GprError as CoreError, NativeCodec, OverrideValue,
    ParameterOverrides, PixelType, Rational, RawImage as CoreRawImage,
};
use numpy::{IntoPyArray, PyArray2};
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Library version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

create_exception!(gpr, GprException, PyException, "Base error of the gpr module.");
create_exception!(gpr, FileError, GprException, "Input or output file problem.");
create_exception!(gpr, AllocationError, GprException, "Native buffer allocation failed.");
create_exception!(gpr, ParameterError, GprException, "Invalid parameter value.");
create_exception!(gpr, FormatError, GprException, "Malformed or unsupported container.");
create_exception!(gpr, ConversionError, GprException, "The codec reported a failure.");

fn to_py_err(err: CoreError) -> PyErr {
    let message = err.to_string();
    let code = err.code();
    let args = (message, code);
    match err.kind() {
        ErrorKind::File => FileError::new_err(args),
        ErrorKind::Memory => AllocationError::new_err(args),
        ErrorKind::Parameter => ParameterError::new_err(args),
        ErrorKind::Format => FormatError::new_err(args),
        ErrorKind::Conversion => ConversionError::new_err(args),
        ErrorKind::Generic => GprException::new_err(args),
    }
}

static CODEC: Mutex<Option<Arc<NativeCodec>>> = Mutex::new(None);

fn codec_slot() -> std::sync::MutexGuard<'static, Option<Arc<NativeCodec>>> {
    match CODEC.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn codec() -> PyResult<Arc<NativeCodec>> {
    let mut slot = codec_slot();
    if let Some(codec) = slot.as_ref() {
        return Ok(Arc::clone(codec));
    }
    let loaded = Arc::new(NativeCodec::load().map_err(to_py_err)?);
    *slot = Some(Arc::clone(&loaded));
    Ok(loaded)
}

/// Loads the native codec library, optionally from an explicit path.
///
/// Without this call the platform-default library name is resolved
/// lazily on first use. Reloading replaces the process-wide codec.
#[pyfunction]
#[pyo3(signature = (path=None))]
fn load_library(path: Option<PathBuf>) -> PyResult<()> {
    let loaded = match path {
        Some(path) => NativeCodec::load_from(&path),
        None => NativeCodec::load(),
    }
    .map_err(to_py_err)?;
    *codec_slot() = Some(Arc::new(loaded));
    Ok(())
}

fn overrides_from_dict(parameters: Option<&Bound<'_, PyDict>>) -> PyResult<ParameterOverrides> {
    let Some(parameters) = parameters else {
        return Ok(ParameterOverrides::default());
    };
    let mut pairs = Vec::with_capacity(parameters.len());
    for (key, value) in parameters.iter() {
        let name: String = key.extract()?;
        // bool is a subtype of int in Python; test it first.
        let value = if let Ok(b) = value.downcast::<pyo3::types::PyBool>() {
            OverrideValue::Bool(b.is_true())
        } else if let Ok(i) = value.extract::<i64>() {
            OverrideValue::Int(i)
        } else {
            return Err(ParameterError::new_err(format!(
                "parameter {name:?} must be an int or a bool"
            )));
        };
        pairs.push((name, value));
    }
    ParameterOverrides::from_pairs(pairs.iter().map(|(n, v)| (n.as_str(), *v)))
        .map_err(to_py_err)
}

/// Converts a GPR file to a DNG file.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, parameters=None))]
fn convert_gpr_to_dng(
    input_path: PathBuf,
    output_path: PathBuf,
    parameters: Option<&Bound<'_, PyDict>>,
) -> PyResult<()> {
    let overrides = overrides_from_dict(parameters)?;
    gpr_core::gpr_to_dng(codec()?.as_ref(), &input_path, &output_path, &overrides)
        .map_err(to_py_err)
}

/// Converts a DNG file to a GPR file.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, parameters=None))]
fn convert_dng_to_gpr(
    input_path: PathBuf,
    output_path: PathBuf,
    parameters: Option<&Bound<'_, PyDict>>,
) -> PyResult<()> {
    let overrides = overrides_from_dict(parameters)?;
    gpr_core::dng_to_gpr(codec()?.as_ref(), &input_path, &output_path, &overrides)
        .map_err(to_py_err)
}

/// Extracts the raw pixel data of a GPR file to a headerless file.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, parameters=None))]
fn convert_gpr_to_raw(
    input_path: PathBuf,
    output_path: PathBuf,
    parameters: Option<&Bound<'_, PyDict>>,
) -> PyResult<()> {
    let overrides = overrides_from_dict(parameters)?;
    gpr_core::gpr_to_raw(codec()?.as_ref(), &input_path, &output_path, &overrides)
        .map_err(to_py_err)
}

/// Rewrites a DNG file through the codec.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, parameters=None))]
fn convert_dng_to_dng(
    input_path: PathBuf,
    output_path: PathBuf,
    parameters: Option<&Bound<'_, PyDict>>,
) -> PyResult<()> {
    let overrides = overrides_from_dict(parameters)?;
    gpr_core::dng_to_dng(codec()?.as_ref(), &input_path, &output_path, &overrides)
        .map_err(to_py_err)
}

fn rational_tuple(py: Python<'_>, r: Rational) -> PyResult<Py<PyTuple>> {
    Ok(PyTuple::new(py, [r.numerator, r.denominator])?.unbind())
}

fn datetime_tuple(py: Python<'_>, dt: DateTime) -> PyResult<Py<PyTuple>> {
    Ok(PyTuple::new(py, [dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second])?.unbind())
}

fn exif_dict<'py>(py: Python<'py>, exif: &ExifInfo) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("camera_make", &exif.camera_make)?;
    dict.set_item("camera_model", &exif.camera_model)?;
    dict.set_item("camera_serial", &exif.camera_serial)?;
    dict.set_item("software_version", &exif.software_version)?;
    dict.set_item("user_comment", &exif.user_comment)?;
    dict.set_item("image_description", &exif.image_description)?;
    dict.set_item("exposure_time", rational_tuple(py, exif.exposure_time)?)?;
    dict.set_item("f_stop_number", rational_tuple(py, exif.f_stop_number)?)?;
    dict.set_item("aperture", rational_tuple(py, exif.aperture)?)?;
    dict.set_item("focal_length", rational_tuple(py, exif.focal_length)?)?;
    dict.set_item("iso_speed_rating", exif.iso_speed_rating)?;
    dict.set_item(
        "focal_length_in_35mm_film",
        exif.focal_length_in_35mm_film,
    )?;
    dict.set_item("exposure_seconds", exif.exposure_seconds())?;
    dict.set_item("f_number", exif.f_number())?;
    dict.set_item(
        "date_time_original",
        datetime_tuple(py, exif.date_time_original)?,
    )?;
    dict.set_item(
        "date_time_digitized",
        datetime_tuple(py, exif.date_time_digitized)?,
    )?;
    match &exif.gps {
        Some(gps) => {
            let gps_dict = PyDict::new(py);
            gps_dict.set_item("latitude", gps.latitude.decimal_degrees())?;
            gps_dict.set_item("longitude", gps.longitude.decimal_degrees())?;
            gps_dict.set_item("altitude", gps.altitude.value())?;
            gps_dict.set_item("below_sea_level", gps.below_sea_level)?;
            gps_dict.set_item("date_stamp", &gps.date_stamp)?;
            dict.set_item("gps", gps_dict)?;
        }
        None => dict.set_item("gps", py.None())?,
    }
    Ok(dict)
}

/// Reads the EXIF metadata of a GPR or DNG file as a dict.
#[pyfunction]
fn read_exif(py: Python<'_>, path: PathBuf) -> PyResult<Py<PyDict>> {
    let exif = gpr_core::read_exif(codec()?.as_ref(), &path).map_err(to_py_err)?;
    Ok(exif_dict(py, &exif)?.unbind())
}

/// Reads the GPR-specific container information as a dict.
#[pyfunction]
fn read_profile(py: Python<'_>, path: PathBuf) -> PyResult<Py<PyDict>> {
    let profile = gpr_core::read_profile(codec()?.as_ref(), &path).map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item("input_width", profile.input_width)?;
    dict.set_item("input_height", profile.input_height)?;
    dict.set_item("input_pitch", profile.input_pitch)?;
    dict.set_item("fast_encoding", profile.fast_encoding)?;
    dict.set_item("compute_md5sum", profile.compute_md5sum)?;
    dict.set_item("enable_preview", profile.enable_preview)?;
    dict.set_item("gpmf_size", profile.gpmf_size)?;
    Ok(dict.unbind())
}

const UPDATABLE_FIELDS: [&str; 14] = [
    "camera_make",
    "camera_model",
    "camera_serial",
    "software_version",
    "user_comment",
    "image_description",
    "exposure_time",
    "f_stop_number",
    "aperture",
    "focal_length",
    "iso_speed_rating",
    "focal_length_in_35mm_film",
    "date_time_original",
    "date_time_digitized",
];

fn update_from_dict(updates: &Bound<'_, PyDict>) -> PyResult<ExifUpdate> {
    let mut update = ExifUpdate::default();
    for (key, value) in updates.iter() {
        let name: String = key.extract()?;
        match name.as_str() {
            "camera_make" => update.camera_make = Some(value.extract()?),
            "camera_model" => update.camera_model = Some(value.extract()?),
            "camera_serial" => update.camera_serial = Some(value.extract()?),
            "software_version" => update.software_version = Some(value.extract()?),
            "user_comment" => update.user_comment = Some(value.extract()?),
            "image_description" => update.image_description = Some(value.extract()?),
            "exposure_time" | "f_stop_number" | "aperture" | "focal_length" => {
                let (numerator, denominator): (u32, u32) = value.extract().map_err(|_| {
                    ParameterError::new_err(format!(
                        "field {name:?} expects a (numerator, denominator) tuple"
                    ))
                })?;
                let rational = Rational::new(numerator, denominator);
                match name.as_str() {
                    "exposure_time" => update.exposure_time = Some(rational),
                    "f_stop_number" => update.f_stop_number = Some(rational),
                    "aperture" => update.aperture = Some(rational),
                    _ => update.focal_length = Some(rational),
                }
            }
            "iso_speed_rating" => update.iso_speed_rating = Some(value.extract()?),
            "focal_length_in_35mm_film" => {
                update.focal_length_in_35mm_film = Some(value.extract()?);
            }
            "date_time_original" | "date_time_digitized" => {
                let (year, month, day, hour, minute, second): (u32, u32, u32, u32, u32, u32) =
                    value.extract().map_err(|_| {
                        ParameterError::new_err(format!(
                            "field {name:?} expects a (year, month, day, hour, minute, second) tuple"
                        ))
                    })?;
                let dt = DateTime {
                    year,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                };
                if name.as_str() == "date_time_original" {
                    update.date_time_original = Some(dt);
                } else {
                    update.date_time_digitized = Some(dt);
                }
            }
            unknown => {
                return Err(ParameterError::new_err(format!(
                    "unknown metadata field {unknown:?}; updatable fields: {}",
                    UPDATABLE_FIELDS.join(", ")
                )));
            }
        }
    }
    Ok(update)
}

/// Rewrites a DNG file with the given metadata fields updated.
///
/// `updates` maps field names to new values; fields not present keep
/// the value already in the file.
#[pyfunction]
fn update_exif(
    input_path: PathBuf,
    output_path: PathBuf,
    updates: &Bound<'_, PyDict>,
) -> PyResult<()> {
    let update = update_from_dict(updates)?;
    gpr_core::update_exif(codec()?.as_ref(), &input_path, &output_path, &update)
        .map_err(to_py_err)
}

/// Reads the image geometry of a GPR or DNG file as a dict.
#[pyfunction]
fn image_info(py: Python<'_>, path: PathBuf) -> PyResult<Py<PyDict>> {
    let info = gpr_core::image_info(codec()?.as_ref(), &path).map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item("width", info.width)?;
    dict.set_item("height", info.height)?;
    dict.set_item("channels", info.channels)?;
    dict.set_item("dtype", info.pixel_type.name())?;
    dict.set_item("data_size", info.data_size)?;
    Ok(dict.unbind())
}

/// Classifies a path by container extension: "gpr", "dng" or "raw".
#[pyfunction]
fn detect_format(path: PathBuf) -> PyResult<&'static str> {
    gpr_core::detect_format(&path)
        .map(|f| f.name())
        .map_err(to_py_err)
}

/// Owner of one decoded raw image.
///
/// Returned uint16 arrays borrow this object's buffer; numpy keeps it
/// alive through the array's base, so the memory cannot be released
/// while any view on it is reachable.
#[pyclass(frozen, name = "RawImage")]
pub struct RawImageOwner {
    image: CoreRawImage,
}

#[pymethods]
impl RawImageOwner {
    /// (height, width) of the image.
    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.image.dimensions()
    }

    fn __repr__(&self) -> String {
        let (height, width) = self.image.dimensions();
        format!("RawImage({width}x{height}, {})", self.image.pixel_type())
    }
}

/// Decodes the raw pixel data of a GPR file as a numpy array.
///
/// `dtype="uint16"` returns a zero-copy view of the codec's buffer,
/// shaped (height, width); `dtype="float32"` returns an owned array
/// normalized to `[0, 1]`.
#[pyfunction]
#[pyo3(signature = (path, dtype="uint16"))]
fn raw_pixels(py: Python<'_>, path: PathBuf, dtype: &str) -> PyResult<Py<PyAny>> {
    let ty: PixelType = dtype.parse().map_err(to_py_err)?;
    let image = gpr_core::raw_pixels(codec()?.as_ref(), &path, ty).map_err(to_py_err)?;

    match ty {
        PixelType::U16 => {
            let owner = Bound::new(py, RawImageOwner { image })?;
            let array = {
                let guard = owner.borrow();
                let view = guard.image.as_u16().ok_or_else(|| {
                    GprException::new_err("raw image lost its native samples")
                })?;
                // The array's base keeps `owner` (and with it the
                // native block) alive for the view's whole life.
                unsafe { PyArray2::borrow_from_array(&view, owner.clone().into_any()) }
            };
            Ok(array.into_any().unbind())
        }
        PixelType::F32 => {
            let array = image.into_f32().into_pyarray(py);
            Ok(array.into_any().unbind())
        }
    }
}

/// Returns the gpr-rs library version.
#[pyfunction]
fn version() -> &'static str {
    VERSION
}

/// Python module initialization.
#[pymodule]
fn gpr(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RawImageOwner>()?;
    m.add_function(wrap_pyfunction!(load_library, m)?)?;
    m.add_function(wrap_pyfunction!(convert_gpr_to_dng, m)?)?;
    m.add_function(wrap_pyfunction!(convert_dng_to_gpr, m)?)?;
    m.add_function(wrap_pyfunction!(convert_gpr_to_raw, m)?)?;
    m.add_function(wrap_pyfunction!(convert_dng_to_dng, m)?)?;
    m.add_function(wrap_pyfunction!(read_exif, m)?)?;
    m.add_function(wrap_pyfunction!(read_profile, m)?)?;
    m.add_function(wrap_pyfunction!(update_exif, m)?)?;
    m.add_function(wrap_pyfunction!(image_info, m)?)?;
    m.add_function(wrap_pyfunction!(detect_format, m)?)?;
    m.add_function(wrap_pyfunction!(raw_pixels, m)?)?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add("GprException", py.get_type::<GprException>())?;
    m.add("FileError", py.get_type::<FileError>())?;
    m.add("AllocationError", py.get_type::<AllocationError>())?;
    m.add("ParameterError", py.get_type::<ParameterError>())?;
    m.add("FormatError", py.get_type::<FormatError>())?;
    m.add("ConversionError", py.get_type::<ConversionError>())?;
    Ok(())
}
