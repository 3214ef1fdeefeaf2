use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use aquashop_core::domain::session::UserId;

use crate::events::{InboundEvent, InboundHandler};

/// Fans events out to one worker per user. A user's events are handled one at
/// a time in arrival order; distinct users run concurrently, at most
/// `max_active_users` at once. A worker exits as soon as its queue drains.
pub struct LaneRouter {
    shared: Arc<LaneShared>,
}

struct LaneShared {
    handler: Arc<dyn InboundHandler>,
    lanes: Mutex<HashMap<UserId, mpsc::UnboundedSender<InboundEvent>>>,
    permits: Arc<Semaphore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LaneRouter {
    pub fn new(handler: Arc<dyn InboundHandler>, max_active_users: usize) -> Self {
        Self {
            shared: Arc::new(LaneShared {
                handler,
                lanes: Mutex::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(max_active_users.max(1))),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub async fn route(&self, event: InboundEvent) {
        let mut lanes = self.shared.lanes.lock().await;
        let event = match lanes.get(&event.user_id) {
            Some(sender) => match sender.send(event) {
                Ok(()) => return,
                // The worker died without draining; start a new lane.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let user_id = event.user_id.clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        lanes.insert(user_id.clone(), sender);
        drop(lanes);

        debug!(user_id = %user_id, "opening user lane");
        let worker = tokio::spawn(run_lane(self.shared.clone(), user_id, event, receiver));

        let mut workers = self.shared.workers.lock().await;
        workers.retain(|handle| !handle.is_finished());
        workers.push(worker);
    }

    pub async fn active_lanes(&self) -> usize {
        self.shared.lanes.lock().await.len()
    }

    /// Waits until every lane has drained, including lanes opened meanwhile.
    pub async fn wait_idle(&self) {
        loop {
            let workers = std::mem::take(&mut *self.shared.workers.lock().await);
            if workers.is_empty() {
                return;
            }
            for worker in workers {
                if let Err(error) = worker.await {
                    warn!(error = %error, "user lane terminated abnormally");
                }
            }
        }
    }
}

async fn run_lane(
    shared: Arc<LaneShared>,
    user_id: UserId,
    first: InboundEvent,
    mut receiver: mpsc::UnboundedReceiver<InboundEvent>,
) {
    let Ok(_permit) = shared.permits.clone().acquire_owned().await else {
        shared.lanes.lock().await.remove(&user_id);
        return;
    };

    let mut next = Some(first);
    while let Some(event) = next.take() {
        shared.handler.handle(event).await;

        next = match receiver.try_recv() {
            Ok(event) => Some(event),
            Err(_) => {
                // Senders only push while holding this lock, so an empty queue
                // seen under it stays empty until the lane is unregistered.
                let mut lanes = shared.lanes.lock().await;
                match receiver.try_recv() {
                    Ok(event) => Some(event),
                    Err(_) => {
                        lanes.remove(&user_id);
                        None
                    }
                }
            }
        };
    }
    debug!(user_id = %user_id, "user lane drained");
}

#[async_trait]
impl InboundHandler for LaneRouter {
    async fn handle(&self, event: InboundEvent) {
        self.route(event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use aquashop_core::domain::session::UserId;

    use super::LaneRouter;
    use crate::events::{EventPayload, InboundEvent, InboundHandler};

    #[derive(Default)]
    struct SlowRecorder {
        seen: Mutex<Vec<(String, i64)>>,
        in_flight_per_user: Mutex<HashMap<String, usize>>,
        overlapping_same_user: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl InboundHandler for SlowRecorder {
        async fn handle(&self, event: InboundEvent) {
            let user = event.user_id.0.clone();
            {
                let mut in_flight = self.in_flight_per_user.lock().await;
                let count = in_flight.entry(user.clone()).or_default();
                *count += 1;
                if *count > 1 {
                    self.overlapping_same_user.fetch_add(1, Ordering::SeqCst);
                }
            }
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            if let Some(count) = self.in_flight_per_user.lock().await.get_mut(&user) {
                *count -= 1;
            }
            self.seen.lock().await.push((user, event.update_id));
        }
    }

    fn text(user: &str, update_id: i64) -> InboundEvent {
        InboundEvent {
            update_id,
            user_id: UserId(user.to_owned()),
            first_name: None,
            chat_id: 1,
            payload: EventPayload::Text(format!("message {update_id}")),
            origin_message_id: None,
        }
    }

    fn updates_for(seen: &[(String, i64)], user: &str) -> Vec<i64> {
        seen.iter().filter(|(owner, _)| owner == user).map(|(_, id)| *id).collect()
    }

    #[tokio::test]
    async fn events_of_one_user_keep_delivery_order() {
        let recorder = Arc::new(SlowRecorder::default());
        let router = LaneRouter::new(recorder.clone(), 4);

        for update_id in 1..=6 {
            let user = if update_id % 2 == 0 { "even" } else { "odd" };
            router.route(text(user, update_id)).await;
        }
        router.wait_idle().await;

        let seen = recorder.seen.lock().await.clone();
        assert_eq!(updates_for(&seen, "odd"), vec![1, 3, 5]);
        assert_eq!(updates_for(&seen, "even"), vec![2, 4, 6]);
        assert_eq!(recorder.overlapping_same_user.load(Ordering::SeqCst), 0);
        assert_eq!(router.active_lanes().await, 0);
    }

    #[tokio::test]
    async fn distinct_users_run_concurrently_up_to_the_bound() {
        let recorder = Arc::new(SlowRecorder::default());
        let router = LaneRouter::new(recorder.clone(), 2);

        for (index, user) in ["a", "b", "c", "d"].into_iter().enumerate() {
            router.route(text(user, index as i64)).await;
        }
        router.wait_idle().await;

        assert_eq!(recorder.seen.lock().await.len(), 4);
        assert_eq!(recorder.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_permit_serializes_all_users() {
        let recorder = Arc::new(SlowRecorder::default());
        let router = LaneRouter::new(recorder.clone(), 1);

        for (index, user) in ["a", "b", "a", "c"].into_iter().enumerate() {
            router.route(text(user, index as i64)).await;
        }
        router.wait_idle().await;

        assert_eq!(recorder.peak.load(Ordering::SeqCst), 1);
        assert_eq!(updates_for(&recorder.seen.lock().await, "a"), vec![0, 2]);
    }

    #[tokio::test]
    async fn drained_lane_is_reopened_for_later_events() {
        let recorder = Arc::new(SlowRecorder::default());
        let router = LaneRouter::new(recorder.clone(), 2);

        router.route(text("a", 1)).await;
        router.wait_idle().await;
        router.route(text("a", 2)).await;
        router.wait_idle().await;

        assert_eq!(updates_for(&recorder.seen.lock().await, "a"), vec![1, 2]);
    }
}
