use crate::api::ApiClient;
use crate::models::Identity;
use crate::realtime::{LiveStatus, RealtimeChannel};
use crate::state::bookmarks::reload_bookmarks;
use crate::state::AppState;
use leptos::logging::{log, warn};
use leptos::prelude::*;

/// What to do with the subscription when the signed-in identity changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SubscriptionPlan<K> {
    Idle,
    Keep,
    /// Close whatever is open, then subscribe for this key.
    Open(K),
    Close,
}

pub(crate) fn plan<K: PartialEq + Clone>(active: Option<&K>, wanted: Option<&K>) -> SubscriptionPlan<K> {
    match (active, wanted) {
        (Some(a), Some(w)) if a == w => SubscriptionPlan::Keep,
        (_, Some(w)) => SubscriptionPlan::Open(w.clone()),
        (Some(_), None) => SubscriptionPlan::Close,
        (None, None) => SubscriptionPlan::Idle,
    }
}

/// A subscription is reopened on the next sync once it stops being live.
pub(crate) trait Subscription {
    fn is_live(&self) -> bool;
}

impl Subscription for RealtimeChannel {
    fn is_live(&self) -> bool {
        RealtimeChannel::is_live(self)
    }
}

/// Who the channel is joined as. A refreshed token is a new key, so the
/// channel rejoins with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChannelKey {
    pub user_id: String,
    pub access_token: String,
}

/// Holds at most one subscription handle `H` under key `K`.
///
/// The old handle is dropped before a new one is opened.
pub(crate) struct SubscriptionSlot<K, H> {
    active: Option<(K, H)>,
}

impl<K, H> Default for SubscriptionSlot<K, H> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<K: PartialEq + Clone, H: Subscription> SubscriptionSlot<K, H> {
    pub fn active_key(&self) -> Option<&K> {
        self.active.as_ref().map(|(k, _)| k)
    }

    pub fn apply(&mut self, wanted: Option<&K>, open: impl FnOnce(&K) -> Option<H>) -> SubscriptionPlan<K> {
        // A dead handle counts as nothing open.
        if self.active.as_ref().is_some_and(|(_, h)| !h.is_live()) {
            self.active = None;
        }

        let next = plan(self.active_key(), wanted);
        match &next {
            SubscriptionPlan::Idle | SubscriptionPlan::Keep => {}
            SubscriptionPlan::Close => self.active = None,
            SubscriptionPlan::Open(key) => {
                self.active = None;
                self.active = open(key).map(|h| (key.clone(), h));
            }
        }
        next
    }

    pub fn close(&mut self) -> bool {
        self.active.take().is_some()
    }
}

/// Live-sync listener: keeps one change subscription per signed-in session
/// and reloads on every change it reports.
#[derive(Clone, Copy)]
pub(crate) struct LiveSync {
    slot: StoredValue<SubscriptionSlot<ChannelKey, RealtimeChannel>, LocalStorage>,
    pub status: RwSignal<LiveStatus>,
}

impl LiveSync {
    pub fn new() -> Self {
        Self {
            slot: StoredValue::new_local(SubscriptionSlot::default()),
            status: RwSignal::new(LiveStatus::Off),
        }
    }

    /// Bring the subscription in line with `identity` and the current token.
    pub fn sync(&self, client: &ApiClient, identity: Option<&Identity>, on_change: impl Fn() + 'static) {
        let wanted = identity.map(|i| ChannelKey {
            user_id: i.id.clone(),
            access_token: client
                .session()
                .map(|s| s.access_token.clone())
                .unwrap_or_default(),
        });
        let url = client.realtime_url();
        let status = self.status;

        self.slot.update_value(|slot| {
            let next = slot.apply(wanted.as_ref(), |key| {
                let url = match &url {
                    Ok(u) => u,
                    Err(e) => {
                        warn!("[live-sync] not subscribing: {e}");
                        return None;
                    }
                };
                status.set(LiveStatus::Connecting);
                RealtimeChannel::open(url, &key.user_id, &key.access_token, on_change, move |s| {
                    status.set(s)
                })
                .map_err(|e| warn!("[live-sync] subscribe failed: {e}"))
                .ok()
            });

            match next {
                SubscriptionPlan::Idle | SubscriptionPlan::Keep => {}
                SubscriptionPlan::Close => {
                    status.set(LiveStatus::Off);
                    log!("[live-sync] closed");
                }
                SubscriptionPlan::Open(key) => {
                    if slot.active_key().is_none() {
                        status.set(LiveStatus::Lost);
                    }
                    log!("[live-sync] open for {}", key.user_id);
                }
            }
        });
    }

    pub fn close(&self) {
        self.slot.update_value(|slot| {
            if slot.close() {
                log!("[live-sync] closed");
            }
        });
        self.status.set(LiveStatus::Off);
    }
}

impl Default for LiveSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribe for whoever is signed in now; each change reloads the list.
pub(crate) fn resync_live(app: AppState) {
    let identity = app.identity.get_untracked();
    let api_client = app.api_client.get_untracked();
    app.live_sync
        .sync(&api_client, identity.as_ref(), move || reload_bookmarks(app));
}

/// Reopen a lost subscription and catch up on whatever it missed.
pub(crate) fn reconnect_live(app: AppState) {
    resync_live(app);
    reload_bookmarks(app);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Stand-in handle that tracks how many are alive.
    struct Handle {
        live: Rc<Cell<i32>>,
        lost: Rc<Cell<bool>>,
    }

    impl Handle {
        fn new(live: &Rc<Cell<i32>>) -> Self {
            Self::with_lost(live, &Rc::new(Cell::new(false)))
        }

        fn with_lost(live: &Rc<Cell<i32>>, lost: &Rc<Cell<bool>>) -> Self {
            live.set(live.get() + 1);
            Self {
                live: live.clone(),
                lost: lost.clone(),
            }
        }
    }

    impl Subscription for Handle {
        fn is_live(&self) -> bool {
            !self.lost.get()
        }
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    fn key(user: &str, token: &str) -> ChannelKey {
        ChannelKey {
            user_id: user.to_string(),
            access_token: token.to_string(),
        }
    }

    #[test]
    fn test_plan_table() {
        assert_eq!(plan::<&str>(None, None), SubscriptionPlan::Idle);
        assert_eq!(plan(None, Some(&"u")), SubscriptionPlan::Open("u"));
        assert_eq!(plan(Some(&"u"), Some(&"u")), SubscriptionPlan::Keep);
        assert_eq!(plan(Some(&"u"), Some(&"v")), SubscriptionPlan::Open("v"));
        assert_eq!(plan(Some(&"u"), None), SubscriptionPlan::Close);
    }

    #[test]
    fn test_at_most_one_subscription() {
        let live = Rc::new(Cell::new(0));
        let mut slot = SubscriptionSlot::default();

        slot.apply(Some(&key("u-1", "t1")), |_| Some(Handle::new(&live)));
        assert_eq!(live.get(), 1);

        // Same identity again: nothing reopened.
        let mut opened = false;
        slot.apply(Some(&key("u-1", "t1")), |_| {
            opened = true;
            Some(Handle::new(&live))
        });
        assert!(!opened);
        assert_eq!(live.get(), 1);

        // Identity changed: old one closed before the new one opens.
        slot.apply(Some(&key("u-2", "t2")), |_| {
            assert_eq!(live.get(), 0);
            Some(Handle::new(&live))
        });
        assert_eq!(live.get(), 1);
        assert_eq!(slot.active_key(), Some(&key("u-2", "t2")));

        // Signed out.
        assert_eq!(slot.apply(None, |_| unreachable!()), SubscriptionPlan::Close);
        assert_eq!(live.get(), 0);
        assert_eq!(slot.active_key(), None);
    }

    #[test]
    fn test_refreshed_token_rejoins() {
        let live = Rc::new(Cell::new(0));
        let mut slot = SubscriptionSlot::default();
        slot.apply(Some(&key("u-1", "old")), |_| Some(Handle::new(&live)));

        let next = slot.apply(Some(&key("u-1", "new")), |k| {
            assert_eq!(k.access_token, "new");
            Some(Handle::new(&live))
        });
        assert_eq!(next, SubscriptionPlan::Open(key("u-1", "new")));
        assert_eq!(live.get(), 1);
    }

    #[test]
    fn test_lost_subscription_reopens_on_next_sync() {
        let live = Rc::new(Cell::new(0));
        let lost = Rc::new(Cell::new(false));
        let mut slot = SubscriptionSlot::default();
        slot.apply(Some(&key("u-1", "t1")), |_| Some(Handle::with_lost(&live, &lost)));

        // Socket closed under us.
        lost.set(true);

        let next = slot.apply(Some(&key("u-1", "t1")), |_| Some(Handle::new(&live)));
        assert_eq!(next, SubscriptionPlan::Open(key("u-1", "t1")));
        assert_eq!(live.get(), 1);
    }

    #[test]
    fn test_failed_open_leaves_slot_empty() {
        let mut slot: SubscriptionSlot<ChannelKey, Handle> = SubscriptionSlot::default();
        slot.apply(Some(&key("u-1", "t1")), |_| None);
        assert_eq!(slot.active_key(), None);
        assert!(!slot.close());
    }

    #[test]
    fn test_close_on_teardown() {
        let live = Rc::new(Cell::new(0));
        let mut slot = SubscriptionSlot::default();
        slot.apply(Some(&key("u-1", "t1")), |_| Some(Handle::new(&live)));
        assert!(slot.close());
        assert_eq!(live.get(), 0);
    }
}
