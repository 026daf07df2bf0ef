//! JSON codec for the optional payload columns (extra info, suggested actions)
//!
//! Absent values are written as SQL NULL. On read, NULL, the empty string and
//! the literal `null` all decode to `None`; anything else must be a JSON object.

use crate::database::error::{CodecError, DatabaseError, DatabaseResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const EXTRA_INFO: &str = "extra info";
pub const SUGGESTED_ACTIONS: &str = "suggested actions";

/// Serialize an optional payload for storage. `None` stays `None` (NULL).
pub fn encode<T: Serialize>(field: &'static str, value: Option<&T>) -> DatabaseResult<Option<String>> {
	let Some(value) = value else {
		return Ok(None);
	};
	let json = serde_json::to_string(value).map_err(|source| DatabaseError::Encode { field, source })?;
	// empty text is normalized to NULL at the write boundary
	Ok(Some(json).filter(|s| !s.is_empty()))
}

/// Decode a stored payload column
pub fn decode<T: DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, CodecError> {
	let Some(raw) = raw else {
		return Ok(None);
	};
	if raw.is_empty() || raw == "null" {
		return Ok(None);
	}
	if !raw.starts_with('{') {
		return Err(CodecError::InvalidJson(raw.to_string()));
	}
	Ok(Some(serde_json::from_str(raw)?))
}

/// Decode a stored payload column, tagging failures with the column's field name
pub fn decode_field<T: DeserializeOwned>(field: &'static str, raw: Option<&str>) -> DatabaseResult<Option<T>> {
	decode(raw).map_err(|source| DatabaseError::Decode { field, source })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::database::types::{ExtraInfo, SuggestedActions};
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Sample {
		key: String,
		value: i32,
	}

	#[test]
	fn test_decode_absent_forms() {
		assert_eq!(decode::<Sample>(None).unwrap(), None);
		assert_eq!(decode::<Sample>(Some("")).unwrap(), None);
		assert_eq!(decode::<Sample>(Some("null")).unwrap(), None);
	}

	#[test]
	fn test_decode_rejects_non_objects() {
		let err = decode::<Sample>(Some("[1, 2, 3]")).unwrap_err();
		assert!(matches!(err, CodecError::InvalidJson(_)));
		assert!(err.to_string().contains("invalid JSON"));

		assert!(decode::<Sample>(Some("42")).is_err());
	}

	#[test]
	fn test_decode_objects() {
		let sample = decode::<Sample>(Some(r#"{"key":"test","value":123}"#)).unwrap();
		assert_eq!(
			sample,
			Some(Sample {
				key: "test".to_string(),
				value: 123
			})
		);

		let err = decode::<Sample>(Some(r#"{"key":"test","value":"not-an-int"}"#)).unwrap_err();
		assert!(matches!(err, CodecError::Json(_)));

		assert!(decode::<Sample>(Some(r#"{"key":"test", unclosed}"#)).is_err());
	}

	#[test]
	fn test_decode_field_wraps_error() {
		let err = decode_field::<ExtraInfo>(EXTRA_INFO, Some("{invalid_json")).unwrap_err();
		assert!(err.is_decode());
		assert!(err.to_string().starts_with("failed to unmarshal extra info"));
	}

	#[test]
	fn test_encode() {
		assert_eq!(encode::<ExtraInfo>(EXTRA_INFO, None).unwrap(), None);
		assert_eq!(
			encode(EXTRA_INFO, Some(&ExtraInfo::new())).unwrap(),
			Some("{}".to_string())
		);

		let actions = SuggestedActions::describe("check cabling");
		let encoded = encode(SUGGESTED_ACTIONS, Some(&actions)).unwrap().unwrap();
		let decoded: Option<SuggestedActions> = decode(Some(&encoded)).unwrap();
		assert_eq!(decoded, Some(actions));
	}
}
