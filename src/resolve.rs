//! The iterative resolution engine: cache-first lookup, delegation
//! discovery by walking towards the root, fan-out querying, and `CNAME`
//! chasing, all under depth and loop budgets.

use async_recursion::async_recursion;
use hickory_proto::op::Message;
use hickory_proto::rr::{Name, Record, RecordType};

use crate::context::Context;
use crate::util::{
    canonical_name, find_a, find_cname_targets, find_nameserver_hosts, parent_name,
};
use crate::{ResolutionError, Resolver, MAX_DEPTH, QUERY_LOOP_THRESHOLD};

impl Resolver {
    /// Assemble the full answer message for one top-level resolution.
    ///
    /// After the first `query_with_cache` pass this retries while the
    /// answer section stays empty, chases `CNAME`s for `A` questions, and
    /// backfills `A` glue for `NS` questions, each within the remaining
    /// depth budget.
    pub(crate) async fn resolve_message(
        &self,
        qname: Name,
        qtype: RecordType,
        mut depth: usize,
        context: &Context,
    ) -> Result<Message, ResolutionError> {
        let mut message = self.query_with_cache(&qname, qtype, depth, context).await?;

        // A delegation walk can come back empty-handed without being an
        // error, e.g. when the authoritative server was only discovered on
        // this pass.  Asking again reuses everything just cached.
        while message.answers().is_empty() && depth < MAX_DEPTH {
            depth += 1;
            match self.query_with_cache(&qname, qtype, depth, context).await {
                Ok(retry) => {
                    for rr in retry.answers() {
                        message.add_answer(rr.clone());
                    }
                    // glue the retry gathered (e.g. the address of an MX
                    // exchange) belongs in the assembled reply too
                    for rr in retry.additionals() {
                        message.add_additional(rr.clone());
                    }
                }
                Err(ResolutionError::QueryLoop) => break,
                Err(error) => {
                    tracing::trace!(%error, "retry pass failed");
                }
            }
        }

        while qtype == RecordType::A
            && find_a(message.answers()).is_empty()
            && depth < MAX_DEPTH
        {
            // follow the latest CNAME added
            let target = match find_cname_targets(message.answers()).last() {
                Some(target) => canonical_name(target),
                None => break,
            };
            depth += 1;
            match self.query_with_cache(&target, RecordType::A, depth, context).await {
                Ok(chased) if !chased.answers().is_empty() => {
                    for rr in chased.answers() {
                        message.add_answer(rr.clone());
                    }
                }
                _ => break,
            }
        }

        if qtype == RecordType::NS && find_a(message.additionals()).is_empty() {
            if let Some(host) = find_nameserver_hosts(message.answers()).first() {
                let host = canonical_name(host);
                if let Ok(glue) = self.query_with_cache(&host, RecordType::A, depth, context).await
                {
                    for rr in glue.additionals() {
                        message.add_additional(rr.clone());
                    }
                }
            }
        }

        Ok(message)
    }

    /// Answer one question, consulting the cache first.
    ///
    /// On a cache miss this finds the nameservers responsible for the
    /// closest enclosing zone - from the cached `NS` set if present,
    /// otherwise by recursively asking the parent zone for its `NS`
    /// records - then queries them in parallel and caches whatever the
    /// winning reply contained.
    ///
    /// # Errors
    ///
    /// See `ResolutionError`.
    #[async_recursion]
    pub(crate) async fn query_with_cache(
        &self,
        qname: &Name,
        qtype: RecordType,
        depth: usize,
        context: &Context,
    ) -> Result<Message, ResolutionError> {
        if depth > MAX_DEPTH {
            tracing::debug!(%qname, %qtype, depth, "hit depth limit");
            return Err(ResolutionError::MaxDepth);
        }

        let cached = self.cache.get(qname, qtype);
        if !cached.answers().is_empty() {
            self.metrics.cache_hit();
            if self.debug() {
                tracing::debug!(%qname, %qtype, depth, "answered from cache");
            }
            return Ok(cached);
        }
        self.metrics.cache_miss();

        if context.bump(qname, qtype) > QUERY_LOOP_THRESHOLD {
            tracing::debug!(%qname, %qtype, "loop detected");
            return Err(ResolutionError::QueryLoop);
        }

        // Find the nameservers delegated for this name.  With nothing
        // cached, ask the parent zone for its NS records; a negative reply
        // from the parent still counts, via its authority section.
        let ns_message = self.cache.get(qname, RecordType::NS);
        let ns_rrs: Vec<Record> = if ns_message.answers().is_empty() {
            let parent = match parent_name(qname) {
                Some(parent) => parent,
                None => return Err(ResolutionError::MaxParent),
            };
            if self.debug() {
                tracing::debug!(%qname, %parent, depth, "no cached delegation, asking parent");
            }
            let parent_reply = self
                .query_with_cache(&parent, RecordType::NS, depth + 1, context)
                .await?;
            if parent_reply.answers().is_empty() {
                parent_reply.name_servers().to_vec()
            } else {
                parent_reply.answers().to_vec()
            }
        } else {
            ns_message.answers().to_vec()
        };

        let hosts = find_nameserver_hosts(&ns_rrs);
        if hosts.is_empty() {
            tracing::debug!(%qname, %qtype, "no nameserver to query");
            return Err(ResolutionError::NoNS);
        }

        let mut reply = self
            .query_nameservers(hosts, qname, qtype, depth + 1, context)
            .await?;

        // The reply may answer an A question with a CNAME only; chase it
        // here so the chain's records are cached together.
        let mut depth = depth;
        while qtype == RecordType::A && find_a(reply.answers()).is_empty() && depth < MAX_DEPTH {
            let target = match find_cname_targets(reply.answers()).last() {
                Some(target) => canonical_name(target),
                None => break,
            };
            depth += 1;
            match self.query_with_cache(&target, RecordType::A, depth, context).await {
                Ok(chased) if !chased.answers().is_empty() => {
                    for rr in chased.answers() {
                        reply.add_answer(rr.clone());
                    }
                }
                _ => break,
            }
        }

        self.cache.insert_message(&reply);

        Ok(reply)
    }
}
