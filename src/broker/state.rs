//! Credential cache shared by every clone of a broker.
//!
//! The slot is only touched at transition points: a lookup deciding between reuse, join, or
//! refresh; the refresh completing; and an explicit invalidation. Each transition happens
//! under one short lock, never across an `.await`.

// std
use std::sync::Weak;
// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::{_prelude::*, auth::Credential, error::AuthError};

/// Refresh future shared by the caller that started it and every caller that joins it.
pub(crate) type PendingCredential = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

/// Observable phase of the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CachePhase {
	/// No credential cached and no refresh running.
	Empty,
	/// A refresh is in flight.
	Fetching,
	/// A credential is cached (it may be inside the expiry buffer).
	Valid,
}

enum CredentialState {
	Empty,
	Fetching(PendingCredential),
	Valid(Credential),
}

struct Slot {
	state: CredentialState,
	// Bumped whenever a refresh starts or the cache is invalidated.
	generation: u64,
}

/// How a lookup obtains its credential.
pub(crate) enum Acquired {
	/// Fresh cached credential.
	Cached(Credential),
	/// This caller started the refresh.
	Started(PendingCredential),
	/// Another caller's refresh is already running.
	Joined(PendingCredential),
}

/// Handle that lets a refresh future publish its own result.
pub(crate) struct RefreshTicket {
	slot: Weak<Mutex<Slot>>,
	generation: u64,
}
impl RefreshTicket {
	/// Stores `result` unless the cache was invalidated or re-armed since the refresh began.
	pub(crate) fn resolve(self, result: &Result<Credential, AuthError>) {
		let Some(slot) = self.slot.upgrade() else { return };
		let mut slot = slot.lock();

		if slot.generation != self.generation {
			return;
		}

		slot.state = match result {
			Ok(credential) => CredentialState::Valid(credential.clone()),
			Err(_) => CredentialState::Empty,
		};
	}
}

#[derive(Clone)]
pub(crate) struct CredentialCache(Arc<Mutex<Slot>>);
impl CredentialCache {
	/// Reuses a credential fresh at `now`, joins the running refresh, or starts one built by
	/// `refresh`.
	pub(crate) fn acquire<F>(&self, now: OffsetDateTime, refresh: F) -> Acquired
	where
		F: FnOnce(RefreshTicket) -> BoxFuture<'static, Result<Credential, AuthError>>,
	{
		let mut slot = self.0.lock();

		match &slot.state {
			CredentialState::Valid(credential) if credential.is_fresh_at(now) =>
				return Acquired::Cached(credential.clone()),
			CredentialState::Fetching(pending) => return Acquired::Joined(pending.clone()),
			CredentialState::Valid(_) | CredentialState::Empty => {},
		}

		slot.generation += 1;

		let ticket = RefreshTicket { slot: Arc::downgrade(&self.0), generation: slot.generation };
		let pending = refresh(ticket).shared();

		slot.state = CredentialState::Fetching(pending.clone());

		Acquired::Started(pending)
	}

	/// Drops any cached credential; a running refresh still answers its waiters but its
	/// result is not cached.
	pub(crate) fn invalidate(&self) {
		let mut slot = self.0.lock();

		slot.generation += 1;
		slot.state = CredentialState::Empty;
	}

	pub(crate) fn phase(&self) -> CachePhase {
		match self.0.lock().state {
			CredentialState::Empty => CachePhase::Empty,
			CredentialState::Fetching(_) => CachePhase::Fetching,
			CredentialState::Valid(_) => CachePhase::Valid,
		}
	}
}
impl Default for CredentialCache {
	fn default() -> Self {
		Self(Arc::new(Mutex::new(Slot { state: CredentialState::Empty, generation: 0 })))
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CredentialCache").field(&self.phase()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::identity::IdentityStep;

	fn credential(expires_at: OffsetDateTime) -> Credential {
		Credential::new("AKID", "secret", expires_at)
	}

	fn ready(
		result: Result<Credential, AuthError>,
	) -> impl FnOnce(RefreshTicket) -> BoxFuture<'static, Result<Credential, AuthError>> {
		move |ticket| {
			async move {
				ticket.resolve(&result);

				result
			}
			.boxed()
		}
	}

	#[tokio::test]
	async fn refresh_populates_cache() {
		let cache = CredentialCache::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let issued = credential(now + Duration::hours(1));
		let Acquired::Started(pending) = cache.acquire(now, ready(Ok(issued.clone()))) else {
			panic!("Empty cache should start a refresh.");
		};

		assert_eq!(cache.phase(), CachePhase::Fetching);
		assert_eq!(pending.await, Ok(issued.clone()));
		assert_eq!(cache.phase(), CachePhase::Valid);
		assert!(matches!(
			cache.acquire(now, |_| panic!("Fresh cache must not refresh.")),
			Acquired::Cached(c) if c == issued
		));
	}

	#[tokio::test]
	async fn concurrent_lookups_join_the_running_refresh() {
		let cache = CredentialCache::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let issued = credential(now + Duration::hours(1));
		let Acquired::Started(first) = cache.acquire(now, ready(Ok(issued.clone()))) else {
			panic!("Empty cache should start a refresh.");
		};
		let Acquired::Joined(second) = cache.acquire(now, |_| panic!("Refresh must be shared."))
		else {
			panic!("Running refresh should be joined.");
		};

		assert_eq!(second.await, Ok(issued.clone()));
		assert_eq!(first.await, Ok(issued));
	}

	#[tokio::test]
	async fn failures_leave_cache_empty() {
		let cache = CredentialCache::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let failure = AuthError::Unreachable {
			step: IdentityStep::ResolveIdentity,
			message: "refused".into(),
		};
		let Acquired::Started(pending) = cache.acquire(now, ready(Err(failure.clone()))) else {
			panic!("Empty cache should start a refresh.");
		};

		assert_eq!(pending.await, Err(failure));
		assert_eq!(cache.phase(), CachePhase::Empty);
	}

	#[tokio::test]
	async fn invalidate_during_refresh_discards_result() {
		let cache = CredentialCache::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let issued = credential(now + Duration::hours(1));
		let Acquired::Started(pending) = cache.acquire(now, ready(Ok(issued.clone()))) else {
			panic!("Empty cache should start a refresh.");
		};

		cache.invalidate();

		assert_eq!(pending.await, Ok(issued), "Waiters still receive the in-flight result.");
		assert_eq!(cache.phase(), CachePhase::Empty);
	}

	#[test]
	fn stale_credentials_trigger_refresh() {
		let cache = CredentialCache::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let Acquired::Started(_) = cache.acquire(now, ready(Ok(credential(now + Duration::minutes(4)))))
		else {
			panic!("Empty cache should start a refresh.");
		};

		// Resolve synchronously by replacing the slot as a completed refresh would.
		{
			let mut slot = cache.0.lock();

			slot.state = CredentialState::Valid(credential(now + Duration::minutes(4)));
		}

		assert!(matches!(
			cache.acquire(now, ready(Ok(credential(now + Duration::hours(1))))),
			Acquired::Started(_)
		));
	}
}
