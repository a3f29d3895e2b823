//! Single-flight access-token renewal.
//!
//! The coordinator is either idle or has exactly one renewal in flight. Every
//! caller that arrives while a renewal is running awaits that same renewal and
//! receives its result; the renewal credential may be single-use server-side,
//! so a second concurrent call would invalidate the first.
//!
//! Renewal results are committed to the store under the slot lock, and only
//! when no [`RefreshCoordinator::reset`] happened since the renewal started.
//! A logout or a fresh sign-in therefore cannot be overwritten by a renewal
//! that was already on the wire.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info, warn};

use super::api::AuthApi;
use super::error::ClientError;
use super::store::TokenStore;
use crate::jwt::{self, now_secs};

/// Renew this long before expiry, in the background.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(120);

type Renewal = Shared<BoxFuture<'static, Option<String>>>;

struct InFlight {
    generation: u64,
    renewal: Renewal,
}

#[derive(Default)]
struct Slot {
    next_generation: u64,
    /// Bumped by `reset`; renewals started under an older epoch are discarded.
    epoch: u64,
    in_flight: Option<InFlight>,
}

/// What one call to the renewal endpoint produced.
enum Outcome {
    Renewed(String),
    /// Credential rejected or unusable token returned: the session is over.
    Revoked,
    /// Transient failure; the stored token is left alone.
    Failed,
}

/// Owns the refresh state for one client. Share it behind an `Arc`.
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    api: Arc<dyn AuthApi>,
    threshold: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            store,
            api,
            threshold: DEFAULT_REFRESH_THRESHOLD,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_slot().in_flight.is_some()
    }

    /// Return a usable access token, renewing it when needed.
    ///
    /// - no stored token: `None` without touching the network
    /// - expired (or undecodable): await a renewal, joining one already running
    /// - valid but inside the threshold: kick off a background renewal and
    ///   return the current token right away
    /// - otherwise: the current token
    pub async fn ensure_valid_token(&self) -> Option<String> {
        let token = self.store.get()?;
        let now = now_secs();

        match jwt::decode(&token) {
            Some(claims) if !claims.is_expired_at(now) => {
                if claims.exp - now <= self.threshold.as_secs() {
                    self.renew_in_background();
                }
                Some(token)
            }
            _ => self.refresh().await,
        }
    }

    /// Renew the access token, sharing any renewal already in flight.
    pub async fn refresh(&self) -> Option<String> {
        self.join_or_start().await
    }

    /// Renew after the server refused `rejected`.
    ///
    /// When the store already holds a different token, someone renewed in the
    /// meantime and that token is returned without a network call. Otherwise
    /// the in-flight renewal is joined, or a new one started.
    pub async fn force_refresh(&self, rejected: &str) -> Option<String> {
        let renewal = {
            let mut slot = self.lock_slot();
            match self.store.get() {
                Some(current) if current != rejected => {
                    debug!("Token already renewed by another request");
                    return Some(current);
                }
                None => return None,
                Some(_) => {}
            }
            let joined = slot.in_flight.as_ref().map(|f| f.renewal.clone());
            match joined {
                Some(renewal) => renewal,
                None => self.start(&mut slot),
            }
        };
        renewal.await
    }

    /// Forget the in-flight renewal and invalidate its result.
    ///
    /// Callers already awaiting it still resolve, with whatever the store
    /// holds once the renewal finishes; the store itself is left untouched.
    pub fn reset(&self) {
        let mut slot = self.lock_slot();
        slot.epoch += 1;
        slot.in_flight = None;
    }

    fn renew_in_background(&self) {
        let renewal = {
            let mut slot = self.lock_slot();
            if slot.in_flight.is_some() {
                return;
            }
            self.start(&mut slot)
        };
        debug!("Access token close to expiry, renewing in background");
        tokio::spawn(async move {
            renewal.await;
        });
    }

    fn join_or_start(&self) -> Renewal {
        let mut slot = self.lock_slot();
        if let Some(in_flight) = &slot.in_flight {
            return in_flight.renewal.clone();
        }
        self.start(&mut slot)
    }

    fn start(&self, slot: &mut Slot) -> Renewal {
        let generation = slot.next_generation;
        slot.next_generation += 1;
        let epoch = slot.epoch;

        let store = Arc::clone(&self.store);
        let api = Arc::clone(&self.api);
        let slot_handle = Arc::clone(&self.slot);

        let renewal = async move {
            let outcome = renew(api.as_ref()).await;

            let mut slot = slot_handle.lock().unwrap_or_else(|e| e.into_inner());
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|f| f.generation == generation)
            {
                slot.in_flight = None;
            }
            if slot.epoch != epoch {
                debug!("Session reset during renewal, discarding result");
                return store.get();
            }
            commit(store.as_ref(), outcome)
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            generation,
            renewal: renewal.clone(),
        });
        renewal
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One call to the renewal endpoint. Failures are logged here; only the
/// outcome reaches the store.
async fn renew(api: &dyn AuthApi) -> Outcome {
    match api.refresh().await {
        Ok(response) => {
            if jwt::decode(&response.access_token).is_none() {
                warn!("Renewal returned a malformed token, clearing session");
                return Outcome::Revoked;
            }
            info!("Access token renewed");
            Outcome::Renewed(response.access_token)
        }
        Err(ClientError::Authentication(_)) => {
            // Missing or invalid renewal credential is the normal signed-out path.
            debug!("Renewal credential rejected, clearing session");
            Outcome::Revoked
        }
        Err(e) => {
            warn!(error = %e, "Token renewal failed");
            Outcome::Failed
        }
    }
}

fn commit(store: &dyn TokenStore, outcome: Outcome) -> Option<String> {
    match outcome {
        Outcome::Renewed(token) => {
            store.set(&token);
            Some(token)
        }
        Outcome::Revoked => {
            store.clear();
            None
        }
        Outcome::Failed => None,
    }
}
