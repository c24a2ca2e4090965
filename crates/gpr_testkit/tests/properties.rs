//! Property tests over the synthetic container and the view math.

use gpr_core::{ExifInfo, Rational};
use gpr_testkit::{decode_container, encode_container, Container, GPR_MAGIC};
use proptest::prelude::*;

proptest! {
    #[test]
    fn container_encoding_round_trips(
        width in 1i32..64,
        height in 1i32..64,
        make in "[A-Za-z0-9 ]{0,31}",
        iso in any::<u16>(),
        num in any::<u32>(),
        den in 1u32..,
    ) {
        let pixels: Vec<u16> = (0..width as usize * height as usize)
            .map(|i| (i % 65536) as u16)
            .collect();
        let container = Container {
            width,
            height,
            exif: ExifInfo {
                camera_make: make,
                iso_speed_rating: iso,
                exposure_time: Rational::new(num, den),
                ..Default::default()
            },
            pixels,
        };

        let bytes = encode_container(GPR_MAGIC, &container);
        let (magic, decoded) = decode_container(&bytes).unwrap();
        prop_assert_eq!(magic, GPR_MAGIC);
        prop_assert_eq!(decoded, container);
    }

    #[test]
    fn truncation_never_panics(
        width in 1i32..16,
        height in 1i32..16,
        cut in 0usize..64,
    ) {
        let container = Container {
            width,
            height,
            exif: ExifInfo::default(),
            pixels: vec![0; width as usize * height as usize],
        };
        let mut bytes = encode_container(GPR_MAGIC, &container);
        let keep = bytes.len().saturating_sub(cut);
        bytes.truncate(keep);
        // Either decodes fully or reports malformed; never panics.
        let _ = decode_container(&bytes);
    }

    #[test]
    fn rational_value_stays_finite(num in any::<u32>(), den in any::<u32>()) {
        let value = Rational::new(num, den).value();
        prop_assert!(value.is_finite());
        prop_assert!(value >= 0.0);
    }
}
