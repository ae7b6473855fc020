//! Utility functions for Clockchain Core
//!
//! Pure helpers shared by the store and the job pipeline.

pub mod fingerprint;
pub mod lenient;
pub mod path_codec;

pub use fingerprint::{fingerprint, fingerprint_attrs, is_fingerprint, FINGERPRINT_FIELDS};
pub use path_codec::{
    decode, decode_partial, encode, month_name, month_number, slugify, PartialCoordinate,
    PathCoordinate, PathError, PathParts, SegmentValue, MONTHS,
};
