//! In-process leaderboard backend with append-only documents and push snapshots.
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    BackendError, ChangeListener, EntryDraft, ErrorListener, LeaderboardBackend, LeaderboardEntry,
    RankedQuery, SubscriptionHandle, rank_order,
};

struct Subscriber {
    id: u64,
    limit: usize,
    on_change: Rc<RefCell<ChangeListener>>,
    on_error: Rc<RefCell<ErrorListener>>,
}

#[derive(Default)]
struct Inner {
    documents: RefCell<Vec<LeaderboardEntry>>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_subscriber: Cell<u64>,
    next_document: Cell<u64>,
    last_timestamp: Cell<u64>,
    queued_failures: RefCell<VecDeque<BackendError>>,
}

/// Shared in-memory collection. Clones observe the same documents.
///
/// Every successful append pushes a fresh capped snapshot to each live
/// subscriber, and a new subscriber receives its first snapshot immediately.
#[derive(Clone, Default)]
pub struct MemoryLeaderboard {
    inner: Rc<Inner>,
}

impl MemoryLeaderboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `append` fail with `err` instead of writing.
    pub fn fail_next_append(&self, err: BackendError) {
        self.inner.queued_failures.borrow_mut().push_back(err);
    }

    /// Deliver a subscription failure to every live subscriber.
    pub fn push_error(&self, err: &BackendError) {
        let listeners: Vec<_> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|sub| Rc::clone(&sub.on_error))
            .collect();
        for listener in listeners {
            (&mut *listener.borrow_mut())(err.clone());
        }
    }

    /// Write a document synchronously, bypassing queued failures.
    pub fn insert_now(&self, player_name: &str, score: u32) -> LeaderboardEntry {
        let entry = LeaderboardEntry {
            id: self.next_document_id(),
            player_name: player_name.to_string(),
            score,
            timestamp: self.next_timestamp(),
        };
        self.inner.documents.borrow_mut().push(entry.clone());
        self.notify_all();
        entry
    }

    /// Ordered documents, uncapped.
    #[must_use]
    pub fn documents(&self) -> Vec<LeaderboardEntry> {
        let mut documents = self.inner.documents.borrow().clone();
        documents.sort_by(rank_order);
        documents
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.inner.documents.borrow().len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn snapshot(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut documents = self.documents();
        documents.truncate(limit);
        documents
    }

    fn notify_all(&self) {
        let listeners: Vec<_> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|sub| (sub.limit, Rc::clone(&sub.on_change)))
            .collect();
        for (limit, listener) in listeners {
            let snapshot = self.snapshot(limit);
            (&mut *listener.borrow_mut())(snapshot);
        }
    }

    fn next_document_id(&self) -> String {
        let id = self.inner.next_document.get() + 1;
        self.inner.next_document.set(id);
        format!("entry-{id:06}")
    }

    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let timestamp = now.max(self.inner.last_timestamp.get().saturating_add(1));
        self.inner.last_timestamp.set(timestamp);
        timestamp
    }
}

#[async_trait(?Send)]
impl LeaderboardBackend for MemoryLeaderboard {
    fn subscribe(
        &self,
        query: RankedQuery,
        on_change: ChangeListener,
        on_error: ErrorListener,
    ) -> SubscriptionHandle {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        let on_change = Rc::new(RefCell::new(on_change));
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            limit: query.limit,
            on_change: Rc::clone(&on_change),
            on_error: Rc::new(RefCell::new(on_error)),
        });
        (&mut *on_change.borrow_mut())(self.snapshot(query.limit));

        let inner: Weak<Inner> = Rc::downgrade(&self.inner);
        SubscriptionHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.borrow_mut().retain(|sub| sub.id != id);
            }
        })
    }

    async fn append(&self, draft: EntryDraft) -> Result<LeaderboardEntry, BackendError> {
        if let Some(err) = self.inner.queued_failures.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(self.insert_now(&draft.player_name, draft.score))
    }
}

impl fmt::Debug for MemoryLeaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLeaderboard")
            .field("documents", &self.document_count())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
