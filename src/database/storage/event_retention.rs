// Retention policy for event buckets.
//
// A policy is resolved once, when a bucket is created, and is owned by that
// bucket. Choosing "no purge" for one bucket yields a disabled policy for that
// bucket only; the store's configuration is never touched.
//
// The purge interval is a fifth of the retention, floored at one second, so
// rows that expired while the process was down are removed soon after restart.

use std::time::Duration;

/// Retention at or below this is treated as disabled
pub const MIN_ENABLED_RETENTION: Duration = Duration::from_secs(1);

/// Floor for the derived purge interval
pub const MIN_PURGE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
	/// Events older than now minus this are purged
	pub retention: Duration,
	/// Delay between purge runs
	pub purge_interval: Duration,
}

impl RetentionPolicy {
	pub fn new(retention: Duration, purge_interval: Duration) -> Self {
		Self {
			retention,
			purge_interval,
		}
	}

	/// Policy with the interval derived from the retention
	pub fn from_retention(retention: Duration) -> Self {
		let purge_interval = (retention / 5).max(MIN_PURGE_INTERVAL);
		Self::new(retention, purge_interval)
	}

	pub fn disabled() -> Self {
		Self::new(Duration::ZERO, Duration::ZERO)
	}

	/// Whether a background purge loop should run for this policy
	pub fn is_enabled(&self) -> bool {
		self.retention > MIN_ENABLED_RETENTION && !self.purge_interval.is_zero()
	}
}

impl Default for RetentionPolicy {
	fn default() -> Self {
		Self::disabled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_interval_derivation() {
		let policy = RetentionPolicy::from_retention(Duration::from_secs(3600));
		assert_eq!(policy.purge_interval, Duration::from_secs(720));
		assert!(policy.is_enabled());

		let policy = RetentionPolicy::from_retention(Duration::from_secs(3));
		assert_eq!(policy.purge_interval, MIN_PURGE_INTERVAL);
	}

	#[test]
	fn test_short_retention_is_disabled() {
		assert!(!RetentionPolicy::from_retention(Duration::ZERO).is_enabled());
		assert!(!RetentionPolicy::from_retention(Duration::from_millis(900)).is_enabled());
		assert!(!RetentionPolicy::from_retention(Duration::from_secs(1)).is_enabled());
		assert!(!RetentionPolicy::disabled().is_enabled());
	}

	#[test]
	fn test_explicit_interval() {
		let policy = RetentionPolicy::new(Duration::from_secs(10), Duration::from_millis(50));
		assert!(policy.is_enabled());
		assert_eq!(policy.purge_interval, Duration::from_millis(50));
	}
}
