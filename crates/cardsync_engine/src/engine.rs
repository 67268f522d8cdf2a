//! The sync decision procedure.

use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use cardsync_codec::{encode_field_line, TextCodec};
use cardsync_model::{compare, Card, Codec, Contact, Tracked};
use cardsync_protocol::UNKNOWN_TIMESTAMP;
use std::thread;
use tracing::{debug, info, warn};

/// What a sync call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Auto-sync disabled and not forced; nothing was attempted.
    Skipped,
    /// Neither side changed; only `LIST`/`SELECT` went over the wire.
    AlreadyInSync,
    /// The remote version replaced local content (GET).
    Fetched,
    /// Local content replaced the remote version (POST).
    Posted,
    /// Local changes were applied incrementally (PUT).
    Pushed,
}

/// How to proceed when both sides changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Push local content, discarding the remote edits.
    KeepLocal,
    /// Fetch remote content, discarding the local edits.
    TakeRemote,
    /// Give up; surfaces [`SyncError::UnsupportedConflict`].
    Refuse,
}

/// Caller-supplied policy for the both-sides-changed case.
///
/// No automatic merge is attempted; the resolver picks a direction or
/// refuses.
pub trait ConflictResolver {
    /// Decides the direction for a conflicted resource.
    fn resolve(&self, resource: &str) -> Resolution;
}

/// The default resolver: every conflict is an error.
pub struct RefuseConflicts;

impl ConflictResolver for RefuseConflicts {
    fn resolve(&self, _resource: &str) -> Resolution {
        Resolution::Refuse
    }
}

enum Action {
    Get,
    Post,
    Put,
    None,
}

enum Attempt {
    Done(SyncOutcome),
    Raced,
}

/// Reconciles one local card against one remote resource.
///
/// One engine handles exactly one `(host, port, resource)` triple and
/// performs one logical operation at a time; the cache directories are
/// shared, unguarded state, so concurrent syncs against the same cache
/// root are not supported.
pub struct SyncEngine<R: RemoteStore> {
    config: SyncConfig,
    cache: CacheStore,
    remote: R,
    codec: TextCodec,
    resolver: Box<dyn ConflictResolver>,
}

impl<R: RemoteStore> SyncEngine<R> {
    /// Creates an engine over a connected remote.
    pub fn new(config: SyncConfig, remote: R) -> SyncResult<Self> {
        let cache = CacheStore::open(&config.cache_root)?;
        Ok(Self {
            config,
            cache,
            remote,
            codec: TextCodec,
            resolver: Box::new(RefuseConflicts),
        })
    }

    /// Installs a conflict resolver.
    pub fn with_resolver(mut self, resolver: Box<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Returns the cache store.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Returns the remote, e.g. to inspect a mock in tests.
    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Ends the remote session and consumes the engine.
    pub fn finish(mut self) -> SyncResult<()> {
        self.remote.stop()
    }

    /// Synchronizes `card` with the remote resource.
    ///
    /// Races with other writers (detected via the `SELECT`
    /// re-validation) are retried with exponential backoff up to the
    /// configured attempt budget.
    pub fn sync(&mut self, card: &mut Card, force: bool) -> SyncResult<SyncOutcome> {
        let max_attempts = self.config.retry.max_attempts;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.config.retry.delay_for_attempt(attempt);
                debug!(?delay, attempt, "backing off before re-sync");
                thread::sleep(delay);
            }
            match self.sync_once(card, force)? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Raced => {
                    warn!(resource = %self.config.resource, "another writer raced; restarting sync");
                }
            }
        }
        Err(SyncError::RaceExhausted {
            resource: self.config.resource.clone(),
            attempts: max_attempts,
        })
    }

    /// Pushes `card` to the remote unconditionally and seeds the
    /// caches, bootstrapping a resource that neither side has synced.
    pub fn publish(&mut self, card: &mut Card) -> SyncResult<i64> {
        let resource = self.config.resource.clone();
        self.remote.select(&resource)?;
        let text = self.codec.serialize(card.contacts().as_slice());
        let ts = self.remote.post_card(&text)?;
        self.commit_local(card, &text, ts)?;
        info!(resource = %resource, timestamp = ts, "published");
        Ok(ts)
    }

    fn sync_once(&mut self, card: &mut Card, force: bool) -> SyncResult<Attempt> {
        let resource = self.config.resource.clone();
        let grace = self.config.grace_millis();

        let ts_original = self.cache.read_timestamp(&resource)?;

        if !force && !self.config.auto_sync && ts_original != UNKNOWN_TIMESTAMP {
            debug!(resource = %resource, "auto-sync disabled, skipping");
            return Ok(Attempt::Done(SyncOutcome::Skipped));
        }

        let ts_server = self
            .remote
            .list(Some(resource.as_str()))?
            .into_iter()
            .find(|(_, name)| name == &resource)
            .map(|(ts, _)| ts)
            .unwrap_or(UNKNOWN_TIMESTAMP);

        // An unusable timestamp pair is never resolved silently. The
        // baseline-newer-than-server check only applies while the
        // server actually has the resource.
        if ts_original == UNKNOWN_TIMESTAMP && ts_server == UNKNOWN_TIMESTAMP {
            return Err(SyncError::TimestampDivergence {
                original: ts_original,
                server: ts_server,
            });
        }
        if ts_server != UNKNOWN_TIMESTAMP && ts_original - ts_server > grace {
            return Err(SyncError::TimestampDivergence {
                original: ts_original,
                server: ts_server,
            });
        }

        let server_changes = ts_server - ts_original > grace;
        let baseline = match self.cache.read_original(&resource)? {
            Some(text) => Some(self.codec.parse(&text)?),
            None => None,
        };
        let local_changes = match &baseline {
            Some(contacts) => !compare(contacts, card.contacts().as_slice()).is_empty(),
            None => false,
        };
        debug!(
            resource = %resource,
            ts_original, ts_server, server_changes, local_changes, "sync state"
        );

        let action = if ts_server == UNKNOWN_TIMESTAMP {
            Action::Post
        } else if ts_original == UNKNOWN_TIMESTAMP {
            Action::Get
        } else if server_changes && local_changes {
            match self.resolver.resolve(&resource) {
                Resolution::KeepLocal => Action::Post,
                Resolution::TakeRemote => Action::Get,
                Resolution::Refuse => {
                    return Err(SyncError::UnsupportedConflict { resource });
                }
            }
        } else if server_changes {
            Action::Get
        } else if local_changes {
            Action::Put
        } else {
            Action::None
        };

        // Re-validate: another writer may have finished since LIST.
        let ts_check = self.remote.select(&resource)?;
        if ts_check != ts_server {
            return Ok(Attempt::Raced);
        }

        let outcome = match action {
            Action::None => SyncOutcome::AlreadyInSync,
            Action::Get => {
                let (ts, text) = self.remote.get_card()?;
                let contacts = self.codec.parse(&text)?;
                card.replace_contacts(contacts);
                let normalized = self.codec.serialize(card.contacts().as_slice());
                self.commit_local(card, &normalized, ts)?;
                SyncOutcome::Fetched
            }
            Action::Post => {
                let text = self.codec.serialize(card.contacts().as_slice());
                let ts = self.remote.post_card(&text)?;
                self.commit_local(card, &text, ts)?;
                SyncOutcome::Posted
            }
            Action::Put => {
                let baseline = baseline.unwrap_or_default();
                let ts = self.push_incremental(&baseline, card.contacts().as_slice())?;
                let text = self.codec.serialize(card.contacts().as_slice());
                self.commit_local(card, &text, ts)?;
                SyncOutcome::Pushed
            }
        };

        info!(resource = %self.config.resource, ?outcome, "synced");
        Ok(Attempt::Done(outcome))
    }

    /// Walks the contact-level diff, recursing to field level for
    /// changed pairs, inside a `PUT_CARD` session.
    fn push_incremental(&mut self, baseline: &[Contact], current: &[Contact]) -> SyncResult<i64> {
        let diff = compare(baseline, current);
        self.remote.begin_put()?;

        for contact in &diff.removed {
            self.remote.delete_contact(&contact.id())?;
        }
        for contact in &diff.added {
            let payload = self.codec.serialize(std::slice::from_ref(contact));
            self.remote.post_contact(&contact.id(), &payload)?;
        }
        for (before, after) in diff.changed_from.iter().zip(&diff.changed_to) {
            self.remote.put_contact(&before.id())?;
            let fields = compare(before.fields().as_slice(), after.fields().as_slice());
            for field in &fields.removed {
                self.remote.delete_data(field.name())?;
            }
            for field in &fields.added {
                self.remote.post_data(&encode_field_line(field))?;
            }
            for (from, to) in fields.changed_from.iter().zip(&fields.changed_to) {
                self.remote.delete_data(from.name())?;
                self.remote.post_data(&encode_field_line(to))?;
            }
        }

        self.remote.end_put()
    }

    /// Records a successful transfer: saves the card to the local
    /// mirror and overwrites the baseline and timestamp caches.
    fn commit_local(&mut self, card: &mut Card, text: &str, ts: i64) -> SyncResult<()> {
        let resource = self.config.resource.clone();
        if card.bound_file().is_none() {
            card.bind_file(self.cache.current_path(&resource));
        }
        if card.is_dirty() {
            card.save(&self.codec)?;
        }
        self.cache.write_current(&resource, text)?;
        self.cache.write_original(&resource, text)?;
        self.cache.write_timestamp(&resource, ts)?;
        card.set_last_modified(ts);
        Ok(())
    }
}
