//! Property-based tests for resolution keys
//!
//! The `WIDTHxHEIGHTxFORMAT` key is what setups persist and what lookups
//! compare, so parsing and formatting must agree for every mode a device
//! can report.
//!
//! Run with: cargo test --test resolution_props

use proptest::prelude::*;
use vhdscan::Resolution;

fn pixel_format() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,4}"
}

proptest! {
    /// Parsing a stringified key gives back the same mode.
    #[test]
    fn key_parses_back(width in 0u32..10_000, height in 0u32..10_000, format in pixel_format()) {
        let key = Resolution::stringify(width, height, &format);
        let parsed: Resolution = key.parse().unwrap();
        prop_assert_eq!(parsed.width(), width);
        prop_assert_eq!(parsed.height(), height);
        prop_assert_eq!(parsed.pixel_format(), format.as_str());
        prop_assert_eq!(parsed.key(), key);
    }

    /// Two modes are equal exactly when their keys are.
    #[test]
    fn equality_follows_key(
        a in (0u32..8, 0u32..8, pixel_format()),
        b in (0u32..8, 0u32..8, pixel_format()),
    ) {
        let left = Resolution::new(a.0, a.1, a.2);
        let right = Resolution::new(b.0, b.1, b.2);
        prop_assert_eq!(left == right, left.key() == right.key());
    }

    /// Arbitrary text never panics the parser.
    #[test]
    fn parse_never_panics(input in ".*") {
        let _ = input.parse::<Resolution>();
    }

    /// The fourcc starts with the format's bytes and is padded with spaces.
    #[test]
    fn fourcc_is_padded(format in pixel_format()) {
        let bytes = Resolution::new(1, 1, format.clone()).fourcc_bytes();
        prop_assert_eq!(&bytes[..format.len()], format.as_bytes());
        prop_assert!(bytes[format.len()..].iter().all(|b| *b == b' '));
    }

    /// Serialized setups carry the key as a plain string.
    #[test]
    fn serde_uses_key(width in 1u32..4096, height in 1u32..4096, format in pixel_format()) {
        let resolution = Resolution::new(width, height, format);
        let json = serde_json::to_string(&resolution).unwrap();
        prop_assert_eq!(json.clone(), format!("\"{}\"", resolution.key()));
        let back: Resolution = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, resolution);
    }
}
