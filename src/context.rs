use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hickory_proto::rr::{Name, RecordType};
use tokio::time::Instant;

/// Per-resolution state, cloned into every task the resolution spawns.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    /// The absolute instant this resolution gives up.  Fan-out tasks bound
    /// their work by this same deadline, so a straggler cannot outlive the
    /// top-level call that spawned it.
    pub(crate) deadline: Instant,

    /// How many times each `(name, type)` pair has been queried.  Fan-out
    /// tasks re-enter the engine when they resolve nameserver hostnames, so
    /// the counts are shared with them; they are the guard against
    /// delegation cycles.
    counts: Arc<Mutex<HashMap<(Name, RecordType), u32>>>,
}

const COUNTER_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] loop counter lock poisoned, cannot recover from this - aborting";

impl Context {
    pub(crate) fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            counts: Arc::default(),
        }
    }

    /// Record another query for the pair and return the updated count.
    pub(crate) fn bump(&self, qname: &Name, qtype: RecordType) -> u32 {
        let mut counts = self.counts.lock().expect(COUNTER_POISON_MESSAGE);
        let count = counts.entry((qname.clone(), qtype)).or_insert(0);
        *count += 1;
        *count
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_util::*;
    use crate::TIMEOUT;

    use super::*;

    #[test]
    fn counts_are_per_pair() {
        let context = Context::new(Instant::now() + TIMEOUT);
        let qname = domain("www.example.com.");

        assert_eq!(1, context.bump(&qname, RecordType::A));
        assert_eq!(2, context.bump(&qname, RecordType::A));
        assert_eq!(1, context.bump(&qname, RecordType::NS));
        assert_eq!(1, context.bump(&domain("example.com."), RecordType::A));
    }

    #[test]
    fn clones_share_counts() {
        let context = Context::new(Instant::now() + TIMEOUT);
        let qname = domain("www.example.com.");

        assert_eq!(1, context.bump(&qname, RecordType::A));
        assert_eq!(2, context.clone().bump(&qname, RecordType::A));
    }
}
