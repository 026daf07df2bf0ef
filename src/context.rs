//! Request context carrying cancellation and an optional deadline
//!
//! Every storage operation takes a `RequestContext`. An operation checks the
//! context before touching the database and races the database future against
//! the context, so a cancelled or expired context fails the call promptly
//! instead of letting it run to completion.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason a context stopped accepting work
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
	#[error("context canceled")]
	Canceled,

	#[error("context deadline exceeded")]
	DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
	token: CancellationToken,
	deadline: Option<Instant>,
}

impl RequestContext {
	/// A context that is never cancelled and has no deadline
	pub fn background() -> Self {
		Self {
			token: CancellationToken::new(),
			deadline: None,
		}
	}

	/// A context that expires `timeout` from now
	pub fn with_timeout(timeout: Duration) -> Self {
		Self::with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(deadline: Instant) -> Self {
		Self {
			token: CancellationToken::new(),
			deadline: Some(deadline),
		}
	}

	/// Wrap an existing token, e.g. one owned by a background task
	pub fn from_token(token: CancellationToken) -> Self {
		Self {
			token,
			deadline: None,
		}
	}

	/// Derive a context that is cancelled whenever this one is.
	/// Cancelling the child does not affect the parent.
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
		}
	}

	/// Derive a child context with a tighter deadline
	pub fn child_with_timeout(&self, timeout: Duration) -> Self {
		let candidate = Instant::now() + timeout;
		let deadline = match self.deadline {
			Some(existing) if existing < candidate => existing,
			_ => candidate,
		};
		Self {
			token: self.token.child_token(),
			deadline: Some(deadline),
		}
	}

	/// The token behind this context, for tasks that should stop with it
	pub fn cancellation_token(&self) -> CancellationToken {
		self.token.clone()
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Fail fast if the context is already cancelled or past its deadline
	pub fn check(&self) -> Result<(), ContextError> {
		if self.token.is_cancelled() {
			return Err(ContextError::Canceled);
		}
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				return Err(ContextError::DeadlineExceeded);
			}
		}
		Ok(())
	}

	/// Resolves once the context is cancelled or its deadline passes
	pub async fn done(&self) -> ContextError {
		match self.deadline {
			Some(deadline) => {
				tokio::select! {
					_ = self.token.cancelled() => ContextError::Canceled,
					_ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
				}
			}
			None => {
				self.token.cancelled().await;
				ContextError::Canceled
			}
		}
	}

	/// Run `operation` under this context.
	///
	/// The context is checked before the future is polled, so an already
	/// cancelled context never starts the operation.
	pub async fn run<F, T, E>(&self, operation: F) -> Result<T, E>
	where
		F: Future<Output = Result<T, E>>,
		E: From<ContextError>,
	{
		self.check()?;
		tokio::select! {
			biased;
			reason = self.done() => Err(E::from(reason)),
			result = operation => result,
		}
	}
}

impl Default for RequestContext {
	fn default() -> Self {
		Self::background()
	}
}
