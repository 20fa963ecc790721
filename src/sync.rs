// View subscription registry and update fan-out
//
// Subscribers register by view id; dispatch walks a snapshot of the
// registration order so a callback may unsubscribe any view mid-dispatch
// without invalidating the iteration. A panicking callback is caught at the
// dispatch boundary, logged, and never prevents delivery to the remaining
// subscribers.

use crate::types::{SeriesId, TickUpdate};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Callback invoked synchronously with each dispatched update
pub type UpdateCallback = Arc<dyn Fn(&TickUpdate) + Send + Sync>;

/// One view's subscription to playback updates
#[derive(Clone)]
pub struct ViewSubscription {
    pub view_id: String,
    pub callback: UpdateCallback,
    /// Restrict `window_data` to these series; `None` means all series.
    /// Series named here but absent from the session are silently omitted.
    pub series_filter: Option<Vec<SeriesId>>,
}

impl ViewSubscription {
    pub fn new<F>(view_id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&TickUpdate) + Send + Sync + 'static,
    {
        Self {
            view_id: view_id.into(),
            callback: Arc::new(callback),
            series_filter: None,
        }
    }

    pub fn with_series_filter(mut self, series: Vec<SeriesId>) -> Self {
        self.series_filter = Some(series);
        self
    }
}

/// Capability interface for collaborators that render playback updates.
///
/// Implement this instead of probing for methods at runtime; `SyncHub`
/// adapts any sink into a regular subscription.
pub trait ViewSink: Send + Sync {
    fn view_id(&self) -> &str;

    fn series_filter(&self) -> Option<Vec<SeriesId>> {
        None
    }

    fn on_update(&self, update: &TickUpdate);
}

/// Counts for one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: usize,
    pub faults: usize,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<String, ViewSubscription>,
    /// Registration order of view ids; dispatch order within one call
    order: Vec<String>,
}

/// Registry of view subscriptions with insertion-ordered synchronous dispatch
#[derive(Default)]
pub struct SyncHub {
    inner: Arc<RwLock<Registry>>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, replacing any prior one with the same
    /// view id (the replaced view keeps its original dispatch position).
    ///
    /// The returned guard unsubscribes on drop; call [`SubscriptionGuard::detach`]
    /// to keep the subscription until an explicit `unsubscribe`.
    pub fn subscribe(&self, subscription: ViewSubscription) -> SubscriptionGuard {
        let view_id = subscription.view_id.clone();
        let mut registry = self.inner.write();
        if registry.subscribers.insert(view_id.clone(), subscription).is_none() {
            registry.order.push(view_id.clone());
        }
        log::debug!("View '{}' subscribed ({} total)", view_id, registry.order.len());
        SubscriptionGuard {
            registry: Arc::downgrade(&self.inner),
            view_id: Some(view_id),
        }
    }

    /// Subscribe a typed sink by adapting it into a callback subscription.
    pub fn subscribe_sink(&self, sink: Arc<dyn ViewSink>) -> SubscriptionGuard {
        let view_id = sink.view_id().to_string();
        let series_filter = sink.series_filter();
        let callback: UpdateCallback = Arc::new(move |update| sink.on_update(update));
        self.subscribe(ViewSubscription {
            view_id,
            callback,
            series_filter,
        })
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, view_id: &str) -> bool {
        let mut registry = self.inner.write();
        let existed = registry.subscribers.remove(view_id).is_some();
        if existed {
            registry.order.retain(|id| id != view_id);
            log::debug!("View '{}' unsubscribed", view_id);
        }
        existed
    }

    /// Dispatch `update` to subscribers in registration order, restricted to
    /// `view_ids` when given. Each subscriber receives `window_data` trimmed
    /// to its series filter.
    pub fn notify_subscribers(
        &self,
        update: &TickUpdate,
        view_ids: Option<&[String]>,
    ) -> DispatchStats {
        // Snapshot the order so callbacks may subscribe/unsubscribe freely
        let snapshot: Vec<String> = {
            let registry = self.inner.read();
            registry
                .order
                .iter()
                .filter(|id| view_ids.map_or(true, |wanted| wanted.contains(id)))
                .cloned()
                .collect()
        };

        let mut stats = DispatchStats::default();
        for view_id in snapshot {
            // Re-check per subscriber: a prior callback may have removed it
            let entry = {
                let registry = self.inner.read();
                registry
                    .subscribers
                    .get(&view_id)
                    .map(|s| (s.callback.clone(), s.series_filter.clone()))
            };
            let Some((callback, series_filter)) = entry else {
                continue;
            };

            let payload = filter_update(update, series_filter.as_deref());
            let result = catch_unwind(AssertUnwindSafe(|| callback(&payload)));
            match result {
                Ok(()) => stats.dispatched += 1,
                Err(panic) => {
                    stats.faults += 1;
                    log::error!(
                        "Subscriber '{}' panicked during dispatch: {}",
                        view_id,
                        panic_message(&panic)
                    );
                }
            }
        }
        stats
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_subscribed(&self, view_id: &str) -> bool {
        self.inner.read().subscribers.contains_key(view_id)
    }
}

fn filter_update(update: &TickUpdate, series_filter: Option<&[SeriesId]>) -> TickUpdate {
    match series_filter {
        None => update.clone(),
        Some(wanted) => {
            let mut filtered = update.clone();
            filtered.window_data.retain(|id, _| wanted.contains(id));
            filtered
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Removes its subscription on drop unless detached.
#[must_use = "dropping the guard unsubscribes the view immediately"]
pub struct SubscriptionGuard {
    registry: Weak<RwLock<Registry>>,
    view_id: Option<String>,
}

impl SubscriptionGuard {
    pub fn view_id(&self) -> &str {
        self.view_id.as_deref().unwrap_or("")
    }

    /// Keep the subscription alive until an explicit `unsubscribe` call.
    pub fn detach(mut self) -> String {
        self.view_id.take().unwrap_or_default()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let (Some(view_id), Some(registry)) = (self.view_id.take(), self.registry.upgrade()) {
            let mut registry = registry.write();
            if registry.subscribers.remove(&view_id).is_some() {
                registry.order.retain(|id| id != &view_id);
            }
        }
    }
}
