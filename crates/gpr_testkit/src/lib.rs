//! # gpr_testkit
//!
//! Test doubles and fixtures for the gpr-rs workspace.
//!
//! The native codec is a proprietary library that is not present on
//! build machines, so the conversion pipeline is exercised against
//! [`StubCodec`], a deterministic in-process codec over a synthetic
//! container format. The stub honors the same contract as the real
//! entry points: it allocates output through the operation's
//! allocator, reports failure as a boolean, and round-trips metadata
//! through the parameters block. [`FailingCodec`] and
//! [`PanickingCodec`] cover the failure and panic paths.

mod codec;
mod fixtures;

pub use codec::{
    decode_container, encode_container, Container, FailingCodec, PanickingCodec, StubCodec,
    DNG_MAGIC, GPR_MAGIC,
};
pub use fixtures::{gradient_pixels, sample_exif, write_dng_fixture, write_gpr_fixture, Fixture};
