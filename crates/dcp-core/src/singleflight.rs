use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Optional per-bundle-id de-duplication of concurrent installs. Off by
/// default; enabling it does not change correctness, only avoids redundant
/// installer runs when two requests for the same bundle id race.
#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, Arc<Notify>>>,
}

pub enum Leadership {
    /// This caller is first: it should do the install and store it,
    /// dropping the guard when done so followers wake up.
    Leader(LeaderGuard),
    /// Another caller is already installing this bundle id; wait on the
    /// notify, then re-check archive presence — a waiter still confirms
    /// the archive exists before returning a hit.
    Follower(Arc<Notify>),
}

pub struct LeaderGuard {
    flight: Arc<SingleFlight>,
    bundle_id: String,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        let notify = self.flight.inflight.lock().unwrap().remove(&self.bundle_id);
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }
}

impl SingleFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquire(self: &Arc<Self>, bundle_id: &str) -> Leadership {
        let mut map = self.inflight.lock().unwrap();
        if let Some(notify) = map.get(bundle_id) {
            Leadership::Follower(notify.clone())
        } else {
            let notify = Arc::new(Notify::new());
            map.insert(bundle_id.to_string(), notify);
            Leadership::Leader(LeaderGuard {
                flight: self.clone(),
                bundle_id: bundle_id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_caller_is_leader_second_is_follower() {
        let flight = SingleFlight::new();
        let leadership_a = flight.acquire("bundle1");
        assert!(matches!(leadership_a, Leadership::Leader(_)));

        let leadership_b = flight.acquire("bundle1");
        assert!(matches!(leadership_b, Leadership::Follower(_)));
    }

    #[tokio::test]
    async fn dropping_leader_wakes_followers() {
        let flight = SingleFlight::new();
        let leadership_a = flight.acquire("bundle1");
        let Leadership::Follower(notify) = flight.acquire("bundle1") else {
            panic!("expected follower");
        };

        let notified = tokio::spawn(async move {
            notify.notified().await;
        });

        drop(leadership_a);
        notified.await.unwrap();
    }

    #[tokio::test]
    async fn different_bundle_ids_do_not_contend() {
        let flight = SingleFlight::new();
        let a = flight.acquire("bundle1");
        let b = flight.acquire("bundle2");
        assert!(matches!(a, Leadership::Leader(_)));
        assert!(matches!(b, Leadership::Leader(_)));
    }
}
