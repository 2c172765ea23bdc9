//! Timestamp codec for service payloads.
//!
//! The service mixes RFC 3339 values with offset-less ISO 8601 values
//! (`2025-06-01T12:00:00.123456`). Offset-less values are read as UTC. Values are always
//! written back as RFC 3339.

// crates.io
use serde::{Deserializer, Serializer, de::Error as _};
use time::{
	PrimitiveDateTime,
	format_description::{BorrowedFormatItem, well_known::Rfc3339},
	macros::format_description,
};
// self
use crate::_prelude::*;

const NAIVE_ISO: &[BorrowedFormatItem<'static>] = format_description!(
	"[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

/// Parses an RFC 3339 or offset-less ISO 8601 timestamp.
pub fn parse(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	OffsetDateTime::parse(raw, &Rfc3339)
		.ok()
		.or_else(|| PrimitiveDateTime::parse(raw, NAIVE_ISO).ok().map(|value| value.assume_utc()))
}

pub(crate) mod lenient_option {
	// self
	use super::*;

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		time::serde::rfc3339::option::serialize(value, serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<String>::deserialize(deserializer)? {
			None => Ok(None),
			Some(raw) if raw.trim().is_empty() => Ok(None),
			Some(raw) => parse(&raw)
				.map(Some)
				.ok_or_else(|| D::Error::custom(format!("unrecognized timestamp `{raw}`"))),
		}
	}
}
