use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::identity::{PluginIdentity, PluginLinks, PluginRecord};

const RELEASE_CHANNEL_CAPACITY: usize = 1024;

/// Thread-safe table of live plugin records plus the lock/unlock/wait
/// primitives that serialize concurrent fetches of the same plugin.
///
/// All mutations go through a single `RwLock`; `Lock` and `Unlock` are
/// therefore linearizable with respect to each other and to `IsLocked`.
pub struct Coordinator {
    records: RwLock<Vec<PluginRecord>>,
    release_tx: broadcast::Sender<PluginRecord>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        let (release_tx, _rx) = broadcast::channel(RELEASE_CHANNEL_CAPACITY);
        Coordinator {
            records: RwLock::new(Vec::new()),
            release_tx,
        }
    }

    /// Idempotent insert: unions links into a matching live record, or
    /// inserts `record` as a new one.
    #[tracing::instrument(skip(self, record), fields(identity = %record.identity))]
    pub async fn add(&self, record: PluginRecord) {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.matches(&record)) {
            Some(existing) => existing.links.union(&record.links),
            None => records.push(record),
        }
        tracing::debug!("published plugin record");
    }

    /// Returns true iff no live record currently matches `identity`; on
    /// true, inserts it as a new live record with no links. This is the
    /// acquisition primitive: the act of locking IS inserting the record.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn lock(&self, identity: PluginIdentity) -> bool {
        let probe = PluginRecord::new(identity.clone());
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.matches(&probe)) {
            tracing::debug!("lock denied, plugin already in flight");
            false
        } else {
            records.push(probe);
            tracing::debug!("lock acquired");
            true
        }
    }

    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn is_locked(&self, identity: &PluginIdentity) -> bool {
        let probe = PluginRecord::new(identity.clone());
        let records = self.records.read().await;
        records.iter().any(|r| r.matches(&probe))
    }

    /// Subtracts `links` from the matched record. If the record's link set
    /// becomes empty it is removed and broadcast on the release channel.
    /// Returns true iff a matching record was found.
    #[tracing::instrument(skip(self, links), fields(identity = %identity))]
    pub async fn unlock(&self, identity: &PluginIdentity, links: &PluginLinks) -> bool {
        let probe = PluginRecord::with_links(identity.clone(), links.clone());
        let mut records = self.records.write().await;
        let Some(pos) = records.iter().position(|r| r.matches(&probe)) else {
            tracing::debug!("unlock found no matching record");
            return false;
        };

        records[pos].links = records[pos].links.remove(links);
        if records[pos].links.is_empty() {
            let released = records.remove(pos);
            tracing::debug!("record emptied, releasing waiters");
            // A broadcast send reaches every currently subscribed receiver in
            // one non-blocking call; with no receivers parked this is a
            // harmless no-op, matching the "drop if nobody's parked" rule.
            let _ = self.release_tx.send(released);
        }
        true
    }

    /// Blocks until a release matching `identity` is observed, or `cancel`
    /// fires. Spurious (non-matching) releases are filtered transparently.
    #[tracing::instrument(skip(self, cancel), fields(identity = %identity))]
    pub async fn wait_release(&self, identity: &PluginIdentity, cancel: &CancellationToken) {
        let mut rx = self.release_tx.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("wait cancelled");
                    return;
                }
                received = rx.recv() => match received {
                    Ok(record) if record.identity.matches(identity) => {
                        tracing::debug!("observed matching release");
                        return;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    /// Read accessor used by the driver loop to scan trapped stderr messages
    /// against every currently-locked plugin.
    pub async fn locked_plugins(&self) -> Vec<PluginIdentity> {
        let records = self.records.read().await;
        records.iter().map(|r| r.identity.clone()).collect()
    }

    /// True iff some live record actually carries `link` in its link set.
    /// Used by the download controller, which only knows the single URL it
    /// was asked to stream and has no other part of the identity to go on.
    ///
    /// Deliberately checks link membership directly rather than going
    /// through `PluginRecord::matches` with a wildcard identity: a record
    /// `lock()` just created has no links yet, and `matches`'s "either side
    /// empty matches" rule would make that bare record match *every* URL,
    /// letting one plugin's download tear down an unrelated plugin's lock.
    pub async fn is_locked_for_link(&self, link: &url::Url) -> bool {
        let records = self.records.read().await;
        records.iter().any(|r| r.links.contains(link))
    }

    /// Removes `link` from whichever live record actually carries it, same
    /// teardown semantics as `unlock`. Returns true iff a matching record
    /// was found. See `is_locked_for_link` for why this doesn't delegate to
    /// `unlock` with a wildcard identity.
    pub async fn unlock_link(&self, link: &url::Url) -> bool {
        let mut records = self.records.write().await;
        let Some(pos) = records.iter().position(|r| r.links.contains(link)) else {
            tracing::debug!("unlock_link found no record carrying this link");
            return false;
        };

        let mut links = PluginLinks::new();
        links.insert(link.clone());
        records[pos].links = records[pos].links.remove(&links);
        if records[pos].links.is_empty() {
            let released = records.remove(pos);
            tracing::debug!("record emptied, releasing waiters");
            let _ = self.release_tx.send(released);
        }
        true
    }
}
