//! Allocation balance across every operation outcome.
//!
//! The global allocator shims count traffic through the codec's
//! allocate/free pair. Each test takes a snapshot, runs one operation
//! to completion, and asserts the delta balances. The counters are
//! process-global, so these tests are serialized.

use gpr_core::{
    gpr_to_dng, raw_pixels, read_exif, update_exif, AllocationStats, ExifUpdate,
    ParameterOverrides, PixelType,
};
use gpr_testkit::{
    write_dng_fixture, write_gpr_fixture, FailingCodec, PanickingCodec, StubCodec,
};
use serial_test::serial;

fn balanced<F: FnOnce()>(run: F) {
    let before = AllocationStats::snapshot();
    run();
    let delta = AllocationStats::snapshot().since(&before);
    assert_eq!(
        delta.allocations, delta.frees,
        "allocation traffic must balance: {delta:?}"
    );
}

#[test]
#[serial]
fn successful_conversion_balances() {
    let fixture = write_gpr_fixture(32, 16);
    let output = fixture.output("out.dng");
    balanced(|| {
        gpr_to_dng(
            &StubCodec,
            fixture.path(),
            &output,
            &ParameterOverrides::default(),
        )
        .unwrap();
    });
}

#[test]
#[serial]
fn failed_conversion_balances() {
    // FailingCodec leaves a live block behind its failure flag; the
    // wrapper must release it.
    let fixture = write_gpr_fixture(8, 8);
    let output = fixture.output("out.dng");
    balanced(|| {
        gpr_to_dng(
            &FailingCodec,
            fixture.path(),
            &output,
            &ParameterOverrides::default(),
        )
        .unwrap_err();
    });
}

#[test]
#[serial]
fn panicking_conversion_balances() {
    let fixture = write_gpr_fixture(8, 8);
    let output = fixture.output("out.dng");
    balanced(|| {
        gpr_to_dng(
            &PanickingCodec,
            fixture.path(),
            &output,
            &ParameterOverrides::default(),
        )
        .unwrap_err();
    });
}

#[test]
#[serial]
fn metadata_extraction_balances() {
    let fixture = write_gpr_fixture(8, 8);
    balanced(|| {
        read_exif(&StubCodec, fixture.path()).unwrap();
    });
}

#[test]
#[serial]
fn metadata_rewrite_balances() {
    let fixture = write_dng_fixture(8, 8);
    let output = fixture.output("out.dng");
    let update = ExifUpdate {
        user_comment: Some("leak check".into()),
        ..Default::default()
    };
    balanced(|| {
        update_exif(&StubCodec, fixture.path(), &output, &update).unwrap();
    });
}

#[test]
#[serial]
fn u16_image_frees_its_buffer_on_drop() {
    let fixture = write_gpr_fixture(16, 16);
    balanced(|| {
        let image = raw_pixels(&StubCodec, fixture.path(), PixelType::U16).unwrap();
        let view = image.as_u16().unwrap();
        assert_eq!(view.shape(), [16, 16]);
        // Native block is released when `image` drops at scope end.
    });
}

#[test]
#[serial]
fn f32_image_frees_the_native_block_eagerly() {
    let fixture = write_gpr_fixture(16, 16);
    let before = AllocationStats::snapshot();
    let image = raw_pixels(&StubCodec, fixture.path(), PixelType::F32).unwrap();
    // The normalized copy owns no codec memory, so the books balance
    // while the image is still alive.
    let delta = AllocationStats::snapshot().since(&before);
    assert_eq!(delta.allocations, delta.frees);
    drop(image);
}

#[test]
#[serial]
fn view_taking_allocates_nothing() {
    let fixture = write_gpr_fixture(32, 16);
    let image = raw_pixels(&StubCodec, fixture.path(), PixelType::U16).unwrap();

    let before = AllocationStats::snapshot();
    let view = image.as_u16().unwrap();
    assert_eq!(view.shape(), [16, 32]);
    let delta = AllocationStats::snapshot().since(&before);
    assert_eq!(delta.allocations, 0);
    assert_eq!(delta.frees, 0);
}
