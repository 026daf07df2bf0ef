//! Type definitions for database storage

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form key/value payload attached to an event; doubles as its dedup key
pub type ExtraInfo = BTreeMap<String, String>;

/// Severity classification of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventType {
	#[default]
	Unknown,
	Info,
	Warning,
	Critical,
	Fatal,
}

impl EventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventType::Unknown => "Unknown",
			EventType::Info => "Info",
			EventType::Warning => "Warning",
			EventType::Critical => "Critical",
			EventType::Fatal => "Fatal",
		}
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EventType {
	type Err = std::convert::Infallible;

	// Unrecognized classifications read back as Unknown rather than failing the row
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"Info" => EventType::Info,
			"Warning" => EventType::Warning,
			"Critical" => EventType::Critical,
			"Fatal" => EventType::Fatal,
			_ => EventType::Unknown,
		})
	}
}

/// Remediation kinds a health check may recommend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairActionType {
	IgnoreNoActionRequired,
	RebootSystem,
	HardwareInspection,
	CheckUserAppAndGpu,
}

/// Suggested remediation attached to an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedActions {
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub descriptions: Vec<String>,

	#[serde(default)]
	pub repair_actions: Vec<RepairActionType>,
}

impl SuggestedActions {
	pub fn describe(description: impl Into<String>) -> Self {
		Self {
			descriptions: vec![description.into()],
			repair_actions: Vec::new(),
		}
	}

	pub fn with_repair_action(mut self, action: RepairActionType) -> Self {
		self.repair_actions.push(action);
		self
	}
}

/// One discrete health event, one row per occurrence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
	/// Unix seconds; any i64, including pre-epoch values
	pub time: i64,

	/// Source identifier, e.g. a kernel log subsystem
	pub name: String,

	pub event_type: EventType,

	/// Human readable description; empty is stored as NULL
	pub message: String,

	pub extra_info: Option<ExtraInfo>,

	pub suggested_actions: Option<SuggestedActions>,
}

impl Event {
	pub fn new(time: i64, name: impl Into<String>, event_type: EventType) -> Self {
		Self {
			time,
			name: name.into(),
			event_type,
			..Default::default()
		}
	}

	/// Create an event stamped with a wall-clock time (truncated to seconds)
	pub fn at<Tz: TimeZone>(time: DateTime<Tz>, name: impl Into<String>, event_type: EventType) -> Self {
		Self::new(time.timestamp(), name, event_type)
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = message.into();
		self
	}

	pub fn with_extra_info<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.extra_info = Some(
			entries
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	pub fn with_suggested_actions(mut self, actions: SuggestedActions) -> Self {
		self.suggested_actions = Some(actions);
		self
	}

	/// The event time as a UTC datetime, if it fits chrono's range
	pub fn datetime(&self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp(self.time, 0)
	}

	/// Dedup comparison on extra info: same key count and identical values.
	/// Absent and empty both count as zero keys.
	pub fn extra_info_matches(&self, other: &Event) -> bool {
		let empty = ExtraInfo::new();
		let a = self.extra_info.as_ref().unwrap_or(&empty);
		let b = other.extra_info.as_ref().unwrap_or(&empty);
		if a.len() != b.len() {
			return false;
		}
		a.iter().all(|(key, value)| b.get(key) == Some(value))
	}
}
