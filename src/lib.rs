//! An iterative DNS resolver.
//!
//! Given a query name and record type, the resolver walks the DNS hierarchy
//! itself, starting from the embedded root hints: it finds the nameservers
//! delegated for the closest enclosing zone, queries them directly over UDP,
//! follows `CNAME` chains, and assembles a response message.  No upstream
//! recursive server is involved at any point.
//!
//! Every record seen along the way lands in a TTL-aware cache, so repeated
//! queries within the TTL window are answered without touching the network.
//!
//! ```no_run
//! # async fn example() -> Result<(), rootward::ResolutionError> {
//! let resolver = rootward::Resolver::new();
//! let response = resolver.resolve("www.example.com", "A").await?;
//! for rr in response.answers() {
//!     println!("{}", rootward::util::format_record(rr));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]

pub mod cache;
mod context;
mod hints;
pub mod metrics;
mod nameserver;
mod resolve;
pub mod util;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

pub use hickory_proto::op::Message;
pub use hickory_proto::rr::{Name, RData, Record, RecordType};

use self::cache::SharedCache;
use self::context::Context;
use self::metrics::{Metrics, MetricsSnapshot};
use self::util::parse_name;

/// Overall deadline for one top-level `resolve` call, and for each single
/// UDP exchange with a nameserver.
pub const TIMEOUT: Duration = Duration::from_secs(4);

/// Maximum recursive depth.  Depth is consumed by the upward walk looking
/// for a delegation, by the empty-answer retry loop, and by `CNAME`
/// chasing, so a pathological zone setup cannot keep the resolver busy
/// forever.
pub const MAX_DEPTH: usize = 10;

/// How many nameservers to query simultaneously for one question.
pub const MAX_NAMESERVERS_CONCURRENT: usize = 4;

/// How many times one `(name, type)` pair may be queried within a single
/// top-level resolution before it is declared a loop.
pub const QUERY_LOOP_THRESHOLD: u32 = 4;

/// An iterative DNS resolver with a shared record cache.
///
/// The resolver is cheap to clone: clones share the cache, the metrics
/// counters, and the debug flag, so one resolver can serve many concurrent
/// resolutions from different tasks.
#[derive(Debug, Clone)]
pub struct Resolver {
    pub(crate) cache: SharedCache,
    pub(crate) metrics: Arc<Metrics>,
    debug: Arc<AtomicBool>,
}

impl Resolver {
    /// Create a resolver whose cache is seeded with the thirteen root
    /// servers from the embedded hints file.
    pub fn new() -> Self {
        Self {
            cache: SharedCache::with_root_hints(),
            metrics: Arc::new(Metrics::new()),
            debug: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable or disable verbose per-step logging of resolutions.  This has
    /// no functional effect.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// A snapshot of the cache and nameserver hit counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve a record by name and type string and return the answer
    /// message.
    ///
    /// `qtype` accepts the upper-case type mnemonics (`"A"`, `"NS"`,
    /// `"CNAME"`, `"MX"`, `"SOA"`, `"PTR"`, ...).  An unrecognised string is
    /// rejected with [`ResolutionError::UnknownQueryType`].  A missing
    /// trailing dot on `name` is appended.
    ///
    /// # Errors
    ///
    /// See [`ResolutionError`].
    pub async fn resolve(&self, name: &str, qtype: &str) -> Result<Message, ResolutionError> {
        let qtype = RecordType::from_str(qtype).map_err(|_| ResolutionError::UnknownQueryType {
            qtype: qtype.to_string(),
        })?;
        self.resolve_type(name, qtype).await
    }

    /// Like [`Resolver::resolve`], but with an already-parsed record type.
    ///
    /// This has a 4s timeout.
    pub async fn resolve_type(
        &self,
        name: &str,
        qtype: RecordType,
    ) -> Result<Message, ResolutionError> {
        let qname = parse_name(name)?;
        let context = Context::new(Instant::now() + TIMEOUT);

        if let Ok(result) = timeout_at(
            context.deadline,
            self.resolve_message(qname.clone(), qtype, 0, &context)
                .instrument(tracing::error_span!("resolve", %qname, %qtype)),
        )
        .await
        {
            result
        } else {
            tracing::debug!(%qname, %qtype, "resolution timed out");
            Err(ResolutionError::Timeout)
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// An error that can occur when trying to resolve a name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolutionError {
    /// Recursion depth exceeded [`MAX_DEPTH`].
    MaxDepth,
    /// The upward NS walk ran out of labels above the root.
    MaxParent,
    /// No nameserver hostname could be extracted from a delegation (neither
    /// `NS` targets nor an `SOA` MNAME).
    NoNS,
    /// One `(name, type)` pair was queried more than
    /// [`QUERY_LOOP_THRESHOLD`] times within a single resolution.
    QueryLoop,
    /// A nameserver hostname resolved to no `A` record, so it cannot be
    /// queried.
    NoAddressForNameserver { nameserver: Name },
    /// The overall deadline or a single UDP exchange deadline fired.
    Timeout,
    /// A transport-level failure from a UDP exchange.
    Network { message: String },
    /// The query name is not a well-formed domain name.
    InvalidName { name: String },
    /// The query type string is not a known type mnemonic.
    UnknownQueryType { qtype: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionError::MaxDepth => write!(f, "max recursion depth reached"),
            ResolutionError::MaxParent => write!(f, "max parent reached"),
            ResolutionError::NoNS => write!(f, "no NS record found for domain"),
            ResolutionError::QueryLoop => write!(f, "loop in query"),
            ResolutionError::NoAddressForNameserver { nameserver } => {
                write!(f, "failed to get A record for {nameserver}")
            }
            ResolutionError::Timeout => write!(f, "query timed out"),
            ResolutionError::Network { message } => write!(f, "network failure: {message}"),
            ResolutionError::InvalidName { name } => write!(f, "invalid domain name '{name}'"),
            ResolutionError::UnknownQueryType { qtype } => {
                write!(f, "unknown query type '{qtype}'")
            }
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
