use crate::models::{Bookmark, Identity, NewBookmark};
use crate::state::session::{call_with_renewal, expire_session};
use crate::state::{notify_failure, AppState};
use crate::util::{normalize_url, placeholder_id};
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;

pub(crate) const ADD_FAILED: &str = "Error adding bookmark";
pub(crate) const DELETE_FAILED: &str = "Could not delete";

/// Lifecycle of one optimistic mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MutationStatus {
    /// Applied locally, remote call in flight.
    Pending,
    /// The backend accepted it.
    Confirmed,
    /// The backend refused it and the local change was undone.
    RolledBack,
    /// A reload replaced the list before the remote call settled; the list is
    /// left as the reload produced it.
    Superseded,
}

#[derive(Clone, Debug)]
pub(crate) struct PendingAdd {
    pub temp_id: String,
    pub record: NewBookmark,
    pub status: MutationStatus,
}

#[derive(Clone, Debug)]
pub(crate) struct PendingRemove {
    pub id: String,
    snapshot: Vec<Bookmark>,
    generation: u64,
    pub status: MutationStatus,
}

/// Validate the add form and build the insert payload.
///
/// `None` when either field is blank or nobody is signed in.
pub(crate) fn prepare_add(title: &str, url: &str, owner: Option<&Identity>) -> Option<NewBookmark> {
    let owner = owner?;
    let title = title.trim();
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    Some(NewBookmark {
        title: title.to_string(),
        url: normalize_url(url),
        user_id: owner.id.clone(),
    })
}

/// The signed-in user's bookmarks, newest first, in the order the backend
/// returned them. Ids are unique at all times, placeholders included.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BookmarkList {
    items: Vec<Bookmark>,
    /// Bumped whenever the whole list is replaced or cleared.
    generation: u64,
}

impl BookmarkList {
    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|b| b.id == id)
    }

    /// Overwrite with a fresh server listing. Unconfirmed placeholders are
    /// discarded along with everything else.
    pub fn replace_all(&mut self, rows: Vec<Bookmark>) {
        let mut seen = std::collections::HashSet::with_capacity(rows.len());
        self.items = rows
            .into_iter()
            .filter(|b| seen.insert(b.id.clone()))
            .collect();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Put a placeholder at the head of the list.
    pub fn insert_placeholder(&mut self, record: NewBookmark) -> PendingAdd {
        let temp_id = placeholder_id(|id| self.contains(id));
        self.items.insert(
            0,
            Bookmark {
                id: temp_id.clone(),
                title: record.title.clone(),
                url: record.url.clone(),
                created_at: None,
                user_id: Some(record.user_id.clone()),
            },
        );

        PendingAdd {
            temp_id,
            record,
            status: MutationStatus::Pending,
        }
    }

    /// `prepare_add` followed by `insert_placeholder`; `None` leaves the list untouched.
    pub fn begin_add(&mut self, title: &str, url: &str, owner: Option<&Identity>) -> Option<PendingAdd> {
        let record = prepare_add(title, url, owner)?;
        Some(self.insert_placeholder(record))
    }

    /// Swap the placeholder for the confirmed row in place, or drop it on failure.
    pub fn settle_add<E>(&mut self, pending: &mut PendingAdd, result: Result<Bookmark, E>) -> MutationStatus {
        let pos = self.items.iter().position(|b| b.id == pending.temp_id);

        pending.status = match (result, pos) {
            (Ok(_), None) => MutationStatus::Superseded,
            (Ok(row), Some(i)) => {
                if self.contains(&row.id) {
                    self.items.remove(i);
                } else {
                    self.items[i] = row;
                }
                MutationStatus::Confirmed
            }
            (Err(_), Some(i)) => {
                self.items.remove(i);
                MutationStatus::RolledBack
            }
            (Err(_), None) => MutationStatus::RolledBack,
        };
        pending.status
    }

    /// Remove `id` immediately, remembering the whole list for rollback.
    ///
    /// Unknown ids and unconfirmed placeholders are left alone.
    pub fn begin_remove(&mut self, id: &str) -> Option<PendingRemove> {
        let pos = self
            .items
            .iter()
            .position(|b| b.id == id && !b.is_placeholder())?;

        let snapshot = self.items.clone();
        self.items.remove(pos);

        Some(PendingRemove {
            id: id.to_string(),
            snapshot,
            generation: self.generation,
            status: MutationStatus::Pending,
        })
    }

    /// On failure the list goes back to exactly what it was before `begin_remove`,
    /// unless a reload or sign-out replaced it since; then it is left alone.
    pub fn settle_remove<E>(&mut self, pending: &mut PendingRemove, result: &Result<(), E>) -> MutationStatus {
        pending.status = match result {
            Ok(()) => MutationStatus::Confirmed,
            Err(_) if pending.generation != self.generation => {
                pending.snapshot.clear();
                MutationStatus::Superseded
            }
            Err(_) => {
                self.items = std::mem::take(&mut pending.snapshot);
                MutationStatus::RolledBack
            }
        };
        pending.status
    }
}

/// Whether a reload response may write the list: it must be the most recently
/// issued one and somebody must still be signed in.
pub(crate) fn should_apply(current: u64, issued: u64, signed_in: bool) -> bool {
    signed_in && current == issued
}

/// The alert for a settled mutation, if it failed and the user is still there.
pub(crate) fn failure_alert<T, E>(
    result: &Result<T, E>,
    signed_in: bool,
    message: &'static str,
) -> Option<&'static str> {
    (result.is_err() && signed_in).then_some(message)
}

/// Values to put back into the add form after a failed insert. Nothing is
/// restored once the user started typing a new entry.
pub(crate) fn restore_form(
    current: (&str, &str),
    typed: (String, String),
) -> Option<(String, String)> {
    (current.0.is_empty() && current.1.is_empty()).then_some(typed)
}

fn signed_in(app: AppState) -> bool {
    app.identity.with_untracked(|i| i.is_some())
}

/// Fetch every row for the signed-in user and replace the list.
///
/// Only the most recently issued reload may write; older responses are dropped.
pub(crate) fn reload_bookmarks(app: AppState) {
    if !signed_in(app) {
        return;
    }

    let req_id = app.reload_request_id.get_untracked().saturating_add(1);
    app.reload_request_id.set(req_id);

    spawn_local(async move {
        let result = call_with_renewal(app, |c| async move { c.select_bookmarks().await }).await;

        if !should_apply(app.reload_request_id.get_untracked(), req_id, signed_in(app)) {
            return;
        }

        match result {
            Ok(rows) => {
                log!("[bookmarks] loaded {} rows", rows.len());
                app.bookmarks.update(|l| l.replace_all(rows));
            }
            Err(e) if e.is_unauthorized() => expire_session(app),
            Err(e) => warn!("[bookmarks] reload failed: {e}"),
        }
    });
}

/// Add from the form inputs: optimistic placeholder, then remote insert.
pub(crate) fn add_bookmark(app: AppState) {
    let identity = app.identity.get_untracked();
    let title = app.title_input.get_untracked();
    let url = app.url_input.get_untracked();

    let Some(mut pending) = app
        .bookmarks
        .try_update(|l| l.begin_add(&title, &url, identity.as_ref()))
        .flatten()
    else {
        return;
    };

    app.title_input.set(String::new());
    app.url_input.set(String::new());

    spawn_local(async move {
        let record = pending.record.clone();
        let result = call_with_renewal(app, |c| {
            let record = record.clone();
            async move { c.insert_bookmark(&record).await }
        })
        .await;
        let failure = result.as_ref().err().cloned();
        let alert = failure_alert(&result, signed_in(app), ADD_FAILED);

        let status = app
            .bookmarks
            .try_update(|l| l.settle_add(&mut pending, result))
            .unwrap_or(MutationStatus::Superseded);

        let Some(e) = failure else {
            log!("[bookmarks] insert {}: {status:?}", pending.temp_id);
            return;
        };
        warn!("[bookmarks] insert failed: {e}");

        // Signed out meanwhile: nothing left to reconcile.
        let Some(message) = alert else {
            return;
        };

        let current = (app.title_input.get_untracked(), app.url_input.get_untracked());
        if let Some((title, url)) = restore_form((current.0.as_str(), current.1.as_str()), (title, url)) {
            app.title_input.set(title);
            app.url_input.set(url);
        }

        if e.is_unauthorized() {
            expire_session(app);
        } else {
            reload_bookmarks(app);
        }
        notify_failure(message);
    });
}

/// Delete `id`: removed at once, restored if the backend refuses.
pub(crate) fn remove_bookmark(app: AppState, id: String) {
    let Some(mut pending) = app.bookmarks.try_update(|l| l.begin_remove(&id)).flatten() else {
        return;
    };

    spawn_local(async move {
        let result = call_with_renewal(app, |c| {
            let id = id.clone();
            async move { c.delete_bookmark(&id).await }
        })
        .await;

        let status = app
            .bookmarks
            .try_update(|l| l.settle_remove(&mut pending, &result))
            .unwrap_or(MutationStatus::Superseded);

        let Err(e) = result.as_ref() else {
            return;
        };
        warn!("[bookmarks] delete {} failed ({status:?}): {e}", pending.id);

        let Some(message) = failure_alert(&result, signed_in(app), DELETE_FAILED) else {
            return;
        };
        if e.is_unauthorized() {
            expire_session(app);
        }
        notify_failure(message);
    });
}
