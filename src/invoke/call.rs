//! Cancellation slot shared by every clone of an invocation client.
//!
//! Each call registers its own [`CancellationToken`]; cancelling fires the token of the most
//! recently started call. A call's guard unregisters it on every exit path, and the deadline
//! timer lives inside [`CallGuard::run`], so nothing outlives the call.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::TimeoutCause};

#[derive(Debug)]
struct ActiveCall {
	id: u64,
	token: CancellationToken,
}

#[derive(Debug, Default)]
struct SlotInner {
	active: Mutex<Option<ActiveCall>>,
	next_id: AtomicU64,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct CallSlot(Arc<SlotInner>);
impl CallSlot {
	/// Registers a new call, replacing the previous registration.
	pub(crate) fn begin(&self) -> CallGuard {
		let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
		let token = CancellationToken::new();

		*self.0.active.lock() = Some(ActiveCall { id, token: token.clone() });

		CallGuard { slot: self.clone(), id, token }
	}

	/// Cancels the registered call, if any.
	pub(crate) fn cancel(&self) {
		if let Some(active) = self.0.active.lock().as_ref() {
			active.token.cancel();
		}
	}

	pub(crate) fn is_idle(&self) -> bool {
		self.0.active.lock().is_none()
	}
}

pub(crate) struct CallGuard {
	slot: CallSlot,
	id: u64,
	token: CancellationToken,
}
impl CallGuard {
	/// Drives `fut` until it completes, the call is cancelled, or `timeout` elapses.
	pub(crate) async fn run<F, T>(&self, timeout: StdDuration, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		tokio::select! {
			biased;
			() = self.token.cancelled() => Err(Error::Timeout { cause: TimeoutCause::Cancelled }),
			() = tokio::time::sleep(timeout) =>
				Err(Error::Timeout { cause: TimeoutCause::DeadlineElapsed }),
			result = fut => result,
		}
	}
}
impl Drop for CallGuard {
	fn drop(&mut self) {
		let mut active = self.slot.0.active.lock();

		if active.as_ref().is_some_and(|call| call.id == self.id) {
			*active = None;
		}
	}
}
