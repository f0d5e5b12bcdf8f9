//! Typed feature encoding.

use crate::error::{ConversionError, ConversionResult};
use crate::types::{Feature, FeatureType};

/// Encode one raw field as a single-valued [`Feature`].
///
/// - `String`/`Bytes`: UTF-8 bytes of the text, never fails.
/// - `Float`/`Int`: the trimmed text must be a base-10 literal, otherwise
///   [`ConversionError::Encoding`].
/// - `Bool`: only `"1"` and `"true"` (trimmed, case-insensitive) are `1`; every other value,
///   including garbage, is `0`. Unrecognised tokens are not an error.
pub fn encode(raw: &str, feature_type: FeatureType) -> ConversionResult<Feature> {
    encode_column("", raw, feature_type)
}

/// Same as [`encode`], naming `column` in the error.
pub fn encode_column(column: &str, raw: &str, feature_type: FeatureType) -> ConversionResult<Feature> {
    match feature_type {
        FeatureType::String | FeatureType::Bytes => Ok(Feature::bytes(raw.as_bytes())),
        FeatureType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Feature::float)
            .map_err(|e| encoding_error(column, feature_type, raw, e.to_string())),
        FeatureType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Feature::int64)
            .map_err(|e| encoding_error(column, feature_type, raw, e.to_string())),
        FeatureType::Bool => Ok(Feature::int64(i64::from(parse_bool(raw)))),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

fn encoding_error(column: &str, feature_type: FeatureType, raw: &str, message: String) -> ConversionError {
    ConversionError::Encoding {
        column: column.to_owned(),
        feature_type,
        raw: raw.to_owned(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_bytes_keep_raw_text() {
        assert_eq!(encode(" String ", FeatureType::String).unwrap(), Feature::bytes(" String "));
        assert_eq!(encode("", FeatureType::Bytes).unwrap(), Feature::bytes(""));
        assert_eq!(
            encode("héllo", FeatureType::String).unwrap(),
            Feature::Bytes(vec!["héllo".as_bytes().to_vec()])
        );
    }

    #[test]
    fn float_parses_and_round_trips() {
        assert_eq!(encode("4.5", FeatureType::Float).unwrap(), Feature::Floats(vec![4.5]));
        assert_eq!(encode(" -1e3 ", FeatureType::Float).unwrap(), Feature::float(-1000.0));
    }

    #[test]
    fn float_parse_failure_is_an_encoding_error() {
        let err = encode_column("score", "4.5.1", FeatureType::Float).unwrap_err();
        assert!(matches!(err, ConversionError::Encoding { .. }));
        let msg = err.to_string();
        assert!(msg.contains("column 'score'"));
        assert!(msg.contains("raw='4.5.1'"));
    }

    #[test]
    fn int_parses_base_ten_only() {
        assert_eq!(encode("1", FeatureType::Int).unwrap(), Feature::Int64s(vec![1]));
        assert_eq!(encode("-42", FeatureType::Int).unwrap(), Feature::int64(-42));
        assert!(encode("0x10", FeatureType::Int).is_err());
        assert!(encode("1.0", FeatureType::Int).is_err());
        assert!(encode("", FeatureType::Int).is_err());
    }

    #[test]
    fn bool_truth_table() {
        for truthy in ["1", "true", "True", "TRUE", "  true\t", " 1 "] {
            assert_eq!(encode(truthy, FeatureType::Bool).unwrap(), Feature::int64(1), "{truthy:?}");
        }
        for falsy in ["0", "false", "FALSE", "", "yes", "y", "t", "garbage", "10"] {
            assert_eq!(encode(falsy, FeatureType::Bool).unwrap(), Feature::int64(0), "{falsy:?}");
        }
    }
}
