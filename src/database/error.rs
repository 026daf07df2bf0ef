//! Error types for database operations

use crate::context::ContextError;
use thiserror::Error;

/// Failure to decode a stored JSON payload column
#[derive(Error, Debug)]
pub enum CodecError {
	/// The column holds something other than a JSON object (array, scalar, garbage)
	#[error("invalid JSON: {0:?}")]
	InvalidJson(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
	#[error("Invalid bucket name {name:?}: {reason}")]
	InvalidBucketName { name: String, reason: String },

	#[error("Invalid configuration: {0}")]
	InvalidConfiguration(String),

	#[error("Database connection failed: {0}")]
	ConnectionFailed(String),

	#[error(transparent)]
	Context(#[from] ContextError),

	#[error("failed to marshal {field}: {source}")]
	Encode {
		field: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to unmarshal {field}: {source}")]
	Decode {
		field: &'static str,
		#[source]
		source: CodecError,
	},

	#[error("{operation} on {table} failed: {source}")]
	Engine {
		operation: &'static str,
		table: String,
		#[source]
		source: sqlx::Error,
	},
}

impl DatabaseError {
	pub(crate) fn engine(operation: &'static str, table: &str, source: sqlx::Error) -> Self {
		DatabaseError::Engine {
			operation,
			table: table.to_string(),
			source,
		}
	}

	/// Check if the request context stopped this operation
	pub fn is_context(&self) -> bool {
		matches!(self, DatabaseError::Context(_))
	}

	/// Check if a stored payload could not be decoded
	pub fn is_decode(&self) -> bool {
		matches!(self, DatabaseError::Decode { .. })
	}

	/// Check if the storage engine reported the failure
	pub fn is_engine(&self) -> bool {
		matches!(
			self,
			DatabaseError::Engine { .. } | DatabaseError::ConnectionFailed(_)
		)
	}
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
