//! End-to-end conversion pipeline tests against the stub codec.

use gpr_core::{
    convert_file, dng_to_gpr, gpr_to_dng, gpr_to_raw, Conversion, GprError, ParameterOverrides,
};
use gpr_testkit::{
    decode_container, write_dng_fixture, write_gpr_fixture, FailingCodec, PanickingCodec,
    StubCodec, DNG_MAGIC, GPR_MAGIC,
};

#[test]
fn gpr_to_dng_preserves_pixels_and_metadata() {
    let fixture = write_gpr_fixture(640, 480);
    let output = fixture.output("converted.dng");

    gpr_to_dng(
        &StubCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap();

    let bytes = std::fs::read(&output).unwrap();
    let (magic, decoded) = decode_container(&bytes).unwrap();
    assert_eq!(magic, DNG_MAGIC);
    assert_eq!(decoded.width, 640);
    assert_eq!(decoded.height, 480);
    assert_eq!(decoded.pixels, fixture.container.pixels);
    assert_eq!(decoded.exif.camera_make, "GoPro");
}

#[test]
fn dng_to_gpr_round_trips_through_metadata_parse() {
    let fixture = write_dng_fixture(64, 48);
    let output = fixture.output("converted.gpr");

    dng_to_gpr(
        &StubCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap();

    let bytes = std::fs::read(&output).unwrap();
    let (magic, decoded) = decode_container(&bytes).unwrap();
    assert_eq!(magic, GPR_MAGIC);
    assert_eq!(decoded.width, 64);
    assert_eq!(decoded.exif.exposure_time, fixture.container.exif.exposure_time);
}

#[test]
fn gpr_to_raw_emits_bare_little_endian_samples() {
    let fixture = write_gpr_fixture(8, 4);
    let output = fixture.output("pixels.raw");

    gpr_to_raw(
        &StubCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap();

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), 8 * 4 * 2);
    let first = u16::from_le_bytes([bytes[0], bytes[1]]);
    let last = u16::from_le_bytes([bytes[62], bytes[63]]);
    assert_eq!(first, fixture.container.pixels[0]);
    assert_eq!(last, fixture.container.pixels[31]);
}

#[test]
fn missing_input_reports_file_not_found_with_path() {
    let fixture = write_gpr_fixture(4, 4);
    let missing = fixture.output("absent.gpr");
    let output = fixture.output("out.dng");

    let err = gpr_to_dng(
        &StubCodec,
        &missing,
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();

    assert_eq!(err.code(), Some(-2));
    match err {
        GprError::FileNotFound { path } => assert_eq!(path, missing),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_input_reports_corrupted_file() {
    let fixture = write_gpr_fixture(4, 4);
    let empty = fixture.output("empty.gpr");
    std::fs::write(&empty, b"").unwrap();
    let output = fixture.output("out.dng");

    let err = gpr_to_dng(&StubCodec, &empty, &output, &ParameterOverrides::default())
        .unwrap_err();
    assert_eq!(err.code(), Some(-4));
}

#[test]
fn codec_failure_reports_both_paths() {
    let fixture = write_gpr_fixture(4, 4);
    let output = fixture.output("out.dng");

    let err = gpr_to_dng(
        &FailingCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();

    assert_eq!(err.code(), Some(-40));
    match err {
        GprError::Conversion {
            operation,
            input,
            output: out,
        } => {
            assert_eq!(operation, "gpr_convert_gpr_to_dng");
            assert_eq!(input, fixture.path());
            assert_eq!(out, output);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // A failed conversion must not leave an output file behind.
    assert!(!output.exists());
}

#[test]
fn codec_panic_is_contained_and_reported() {
    let fixture = write_gpr_fixture(4, 4);
    let output = fixture.output("out.dng");

    let err = gpr_to_dng(
        &PanickingCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();

    assert_eq!(err.code(), None);
    let message = err.to_string();
    assert!(message.contains("gpr_convert_gpr_to_dng"));
    assert!(message.contains("synthetic codec fault"));
}

#[test]
fn wrong_container_for_conversion_is_rejected() {
    // A .gpr extension on the input of a DNG-consuming conversion
    // fails before the codec runs.
    let fixture = write_gpr_fixture(4, 4);
    let output = fixture.output("out.gpr");

    let err = dng_to_gpr(
        &StubCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(-31));
    assert!(err.to_string().contains("dng"));
}

#[test]
fn truncated_container_fails_as_conversion_error() {
    let fixture = write_gpr_fixture(4, 4);
    let truncated = fixture.output("broken.gpr");
    let bytes = std::fs::read(fixture.path()).unwrap();
    std::fs::write(&truncated, &bytes[..bytes.len() - 5]).unwrap();
    let output = fixture.output("out.dng");

    let err = gpr_to_dng(
        &StubCodec,
        &truncated,
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(-40));
}

#[test]
fn failed_conversion_keeps_existing_output_intact() {
    let fixture = write_gpr_fixture(4, 4);
    let output = fixture.output("out.dng");
    std::fs::write(&output, b"previous contents").unwrap();

    gpr_to_dng(
        &FailingCodec,
        fixture.path(),
        &output,
        &ParameterOverrides::default(),
    )
    .unwrap_err();

    assert_eq!(std::fs::read(&output).unwrap(), b"previous contents");
}

#[test]
fn overrides_reject_out_of_range_dimensions() {
    let fixture = write_gpr_fixture(4, 4);
    let output = fixture.output("out.dng");

    let overrides =
        ParameterOverrides::from_pairs([("input_width", gpr_core::OverrideValue::Int(0))])
            .unwrap();
    let err = gpr_to_dng(&StubCodec, fixture.path(), &output, &overrides).unwrap_err();
    assert_eq!(err.code(), Some(-20));
    assert!(err.to_string().contains("input_width"));
}

#[test]
fn unknown_override_name_lists_recognized_set() {
    let err =
        ParameterOverrides::from_pairs([("qualityy", gpr_core::OverrideValue::Bool(true))])
            .unwrap_err();
    assert_eq!(err.code(), Some(-20));
    let message = err.to_string();
    for name in gpr_core::RECOGNIZED_PARAMETERS {
        assert!(message.contains(name), "missing {name} in {message}");
    }
}

#[test]
fn fast_encoding_override_reaches_the_codec() {
    // DngToDng re-encodes from the parameters block, so an override
    // changing the embedded geometry is visible in the output.
    let fixture = write_dng_fixture(6, 2);
    let output = fixture.output("rewritten.dng");
    let overrides = ParameterOverrides::from_pairs([
        ("fast_encoding", gpr_core::OverrideValue::Bool(true)),
        ("input_pitch", gpr_core::OverrideValue::Int(6)),
    ])
    .unwrap();

    convert_file(
        &StubCodec,
        Conversion::DngToDng,
        fixture.path(),
        &output,
        &overrides,
    )
    .unwrap();
    assert!(output.exists());
}
