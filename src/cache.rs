use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata;
use hickory_proto::rr::{Name, RData, Record, RecordType};

use crate::hints::root_hints;
use crate::util::{canonical_name, find_cname_targets, find_mx_exchanges, find_ns_targets};

/// A convenience wrapper around a `Cache` which lets it be shared
/// between tasks.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `Cache` object.  Reads take the read
/// half of the lock, inserts the write half; the lock is never held
/// across network I/O.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<RwLock<Cache>>,
}

const LOCK_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache lock poisoned, cannot recover from this - aborting";

impl SharedCache {
    /// Make a new, empty, shared cache.
    pub fn new() -> Self {
        SharedCache {
            cache: Arc::new(RwLock::new(Cache::new())),
        }
    }

    /// Make a shared cache seeded with the root `NS` records and their `A`
    /// glue from the embedded hints.
    pub fn with_root_hints() -> Self {
        SharedCache {
            cache: Arc::new(RwLock::new(Cache::with_root_hints())),
        }
    }

    /// Look up `(name, type)` and build a synthetic response message.
    ///
    /// The TTLs in the returned records are relative to the current time,
    /// not to when the records were inserted into the cache.
    pub fn get(&self, name: &Name, qtype: RecordType) -> Message {
        self.cache.read().expect(LOCK_POISON_MESSAGE).get(name, qtype)
    }

    /// Insert a single record into the cache.
    pub fn insert(&self, record: &Record) {
        self.cache.write().expect(LOCK_POISON_MESSAGE).insert(record);
    }

    /// Insert every record of the message's answer, authority, and
    /// additional sections.  An empty message is a no-op.
    pub fn insert_message(&self, message: &Message) {
        let mut cache = self.cache.write().expect(LOCK_POISON_MESSAGE);
        for rr in message.answers() {
            cache.insert(rr);
        }
        for rr in message.name_servers() {
            cache.insert(rr);
        }
        for rr in message.additionals() {
            cache.insert(rr);
        }
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One cached record: its data and the absolute instant it stops being
/// served.  The owner name and type are the keys it is filed under.
#[derive(Debug, Clone, PartialEq)]
struct CachedRecord {
    rdata: RData,
    expires_at: Instant,
}

/// TTL-aware storage of resource records, deduplicated on
/// `(name, type, rdata)`.
///
/// You probably want to use `SharedCache` instead.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    /// Cached records, indexed by canonical owner name and then by type.
    ///
    /// INVARIANT: no two entries in one vector have equal `rdata`.
    entries: HashMap<Name, HashMap<RecordType, Vec<CachedRecord>>>,
}

impl Cache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache seeded from the embedded root hints.  The hints
    /// declare very long TTLs, so the root `NS` set never expires in
    /// practice and the resolver never has to ask anyone for it.
    pub fn with_root_hints() -> Self {
        let mut cache = Self::new();
        for rr in root_hints() {
            cache.insert(&rr);
        }
        cache
    }

    /// Look up `(name, type)` and build a synthetic response message whose
    /// answer section holds every unexpired match, TTLs rewritten to the
    /// remaining whole seconds.
    ///
    /// For `NS`, `MX`, and `CNAME` lookups the additional section is
    /// enriched with the `A` records of the target names, when those are
    /// cached too.  Enrichment is single-level: the `A` lookups do not
    /// themselves enrich.
    pub fn get(&self, name: &Name, qtype: RecordType) -> Message {
        let now = Instant::now();
        let name = canonical_name(name);

        let mut message = Message::new();
        message.set_message_type(MessageType::Response);

        let answers = self.lookup(&name, qtype, now);

        let glue_targets = match qtype {
            RecordType::NS => find_ns_targets(&answers),
            RecordType::MX => find_mx_exchanges(&answers),
            RecordType::CNAME => find_cname_targets(&answers),
            _ => Vec::new(),
        };

        for rr in answers {
            message.add_answer(rr);
        }
        for target in glue_targets {
            for rr in self.lookup(&canonical_name(&target), RecordType::A, now) {
                message.add_additional(rr);
            }
        }

        message
    }

    /// Insert a record.
    ///
    /// The owner name is canonicalised, as is the target of an `NS`
    /// record.  If an entry with the same `(name, type, rdata)` already
    /// exists, its expiry is extended to the later of the existing expiry
    /// and `now + ttl` - duplicates never shorten a record's life.
    pub fn insert(&mut self, record: &Record) {
        let rdata = match record.data() {
            Some(RData::NS(ns)) => RData::NS(rdata::NS(canonical_name(&ns.0))),
            Some(other) => other.clone(),
            None => return,
        };
        let name = canonical_name(record.name());
        let expires_at = Instant::now() + Duration::from_secs(u64::from(record.ttl()));

        let records = self
            .entries
            .entry(name)
            .or_default()
            .entry(record.record_type())
            .or_default();

        if let Some(existing) = records.iter_mut().find(|cached| cached.rdata == rdata) {
            if expires_at > existing.expires_at {
                existing.expires_at = expires_at;
            }
        } else {
            records.push(CachedRecord { rdata, expires_at });
        }
    }

    /// All unexpired records for `(name, qtype)`, with relative TTLs.
    /// Expired entries are skipped, not removed; they die passively.
    fn lookup(&self, name: &Name, qtype: RecordType, now: Instant) -> Vec<Record> {
        let mut rrs = Vec::new();
        if let Some(by_type) = self.entries.get(name) {
            if let Some(records) = by_type.get(&qtype) {
                for cached in records {
                    if cached.expires_at > now {
                        let ttl = cached
                            .expires_at
                            .saturating_duration_since(now)
                            .as_secs()
                            .try_into()
                            .unwrap_or(u32::MAX);
                        rrs.push(Record::from_rdata(name.clone(), ttl, cached.rdata.clone()));
                    }
                }
            }
        }
        rrs
    }
}
