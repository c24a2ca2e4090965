//! On-disk fixtures for pipeline tests.

use crate::codec::{encode_container, Container, DNG_MAGIC, GPR_MAGIC};
use gpr_core::{DateTime, ExifInfo, Rational};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Deterministic row-major gradient, wrapping at the sample range.
#[must_use]
pub fn gradient_pixels(width: usize, height: usize) -> Vec<u16> {
    (0..width * height).map(|i| (i % 65536) as u16).collect()
}

/// Metadata of a plausible capture, used by every fixture.
#[must_use]
pub fn sample_exif() -> ExifInfo {
    ExifInfo {
        camera_make: "GoPro".into(),
        camera_model: "HERO12 Black".into(),
        camera_serial: "C3501234567890".into(),
        software_version: "H23.01.01.10.00".into(),
        exposure_time: Rational::new(1, 480),
        f_stop_number: Rational::new(28, 10),
        aperture: Rational::new(28, 10),
        focal_length: Rational::new(3, 1),
        iso_speed_rating: 100,
        focal_length_in_35mm_film: 15,
        date_time_original: DateTime {
            year: 2024,
            month: 6,
            day: 1,
            hour: 12,
            minute: 30,
            second: 5,
        },
        date_time_digitized: DateTime {
            year: 2024,
            month: 6,
            day: 1,
            hour: 12,
            minute: 30,
            second: 5,
        },
        ..Default::default()
    }
}

/// A temporary directory holding one synthetic container file.
pub struct Fixture {
    dir: TempDir,
    path: PathBuf,
    /// The contents the container was encoded from.
    pub container: Container,
}

impl Fixture {
    /// Path of the container file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for an output file in the same temporary directory.
    #[must_use]
    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn write_fixture(magic: [u8; 4], name: &str, width: i32, height: i32) -> Fixture {
    let container = Container {
        width,
        height,
        exif: sample_exif(),
        pixels: gradient_pixels(width as usize, height as usize),
    };
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let path = dir.path().join(name);
    std::fs::write(&path, encode_container(magic, &container))
        .unwrap_or_else(|e| panic!("fixture write failed: {e}"));
    Fixture {
        dir,
        path,
        container,
    }
}

/// Writes a synthetic `.gpr` container of the given geometry.
#[must_use]
pub fn write_gpr_fixture(width: i32, height: i32) -> Fixture {
    write_fixture(GPR_MAGIC, "sample.gpr", width, height)
}

/// Writes a synthetic `.dng` container of the given geometry.
#[must_use]
pub fn write_dng_fixture(width: i32, height: i32) -> Fixture {
    write_fixture(DNG_MAGIC, "sample.dng", width, height)
}
