//! Talking to remote nameservers: a single UDP exchange with one server,
//! and the shuffled parallel fan-out across a delegation's nameserver set.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at};
use tracing::Instrument;

use crate::context::Context;
use crate::util::{canonical_name, find_a, find_a_owner_names, find_ns_targets, ipv4_literal};
use crate::{ResolutionError, Resolver, MAX_NAMESERVERS_CONCURRENT, TIMEOUT};

impl Resolver {
    /// Ask up to [`MAX_NAMESERVERS_CONCURRENT`] of the given nameservers
    /// the same question at once, in uniformly random order, and return the
    /// first reply that is not an error.  If every task fails, the last
    /// failure is returned.
    ///
    /// Losing replies are discarded: nothing from them is cached.  Once the
    /// race settles the losing tasks are aborted, and each task is bounded
    /// by the resolution's shared deadline besides, so a straggler whose
    /// caller already timed out dies with the deadline rather than running
    /// on its own clock.
    pub(crate) async fn query_nameservers(
        &self,
        mut nameservers: Vec<Name>,
        qname: &Name,
        qtype: RecordType,
        depth: usize,
        context: &Context,
    ) -> Result<Message, ResolutionError> {
        nameservers.shuffle(&mut rand::thread_rng());
        nameservers.truncate(MAX_NAMESERVERS_CONCURRENT);

        let (reply_tx, mut reply_rx) = mpsc::channel(nameservers.len().max(1));
        let mut tasks = Vec::with_capacity(nameservers.len());

        for nameserver in nameservers {
            let span = tracing::error_span!("query_nameserver", %nameserver);
            let resolver = self.clone();
            let qname = qname.clone();
            let context = context.clone();
            let reply_tx = reply_tx.clone();
            tasks.push(tokio::spawn(
                async move {
                    let reply = match timeout_at(
                        context.deadline,
                        resolver.query_single(&nameserver, &qname, qtype, depth, &context),
                    )
                    .await
                    {
                        Ok(reply) => reply,
                        Err(_) => Err(ResolutionError::Timeout),
                    };
                    // the receiver is gone if a sibling already won
                    let _ = reply_tx.send(reply).await;
                }
                .instrument(span),
            ));
        }
        drop(reply_tx);

        let mut outstanding = tasks.len();
        let result = loop {
            match reply_rx.recv().await {
                Some(Ok(response)) => break Ok(response),
                Some(Err(error)) => {
                    outstanding -= 1;
                    if outstanding == 0 {
                        break Err(error);
                    }
                    tracing::debug!(%error, "nameserver failed, waiting on siblings");
                }
                None => break Err(ResolutionError::NoNS),
            }
        };

        // the race is settled, the losers have nothing left to offer
        for task in &tasks {
            task.abort();
        }

        match &result {
            Ok(_) => self.metrics.nameserver_hit(),
            Err(_) => self.metrics.nameserver_miss(),
        }

        result
    }

    /// Send one question to one nameserver and return its reply.
    ///
    /// The nameserver may be given as an IPv4 literal, which is used
    /// directly; a hostname is first resolved to an address through the
    /// engine itself.  Recursion is not requested of the remote server,
    /// except for `NS` questions.
    pub(crate) async fn query_single(
        &self,
        nameserver: &Name,
        qname: &Name,
        qtype: RecordType,
        depth: usize,
        context: &Context,
    ) -> Result<Message, ResolutionError> {
        let address = self.nameserver_address(nameserver, depth, context).await?;

        if self.debug() {
            tracing::debug!(%nameserver, %address, %qname, %qtype, depth, "querying nameserver");
        }

        let mut reply = exchange_udp(address, qname, qtype).await?;

        if qtype == RecordType::NS {
            self.backfill_ns_glue(address, &mut reply).await;
        }

        Ok(reply)
    }

    /// The IPv4 address to reach a nameserver at.
    async fn nameserver_address(
        &self,
        nameserver: &Name,
        depth: usize,
        context: &Context,
    ) -> Result<Ipv4Addr, ResolutionError> {
        if let Some(address) = ipv4_literal(nameserver) {
            return Ok(address);
        }

        let response = self
            .query_with_cache(&canonical_name(nameserver), RecordType::A, depth + 1, context)
            .await?;

        find_a(response.answers()).first().copied().ok_or_else(|| {
            ResolutionError::NoAddressForNameserver {
                nameserver: nameserver.clone(),
            }
        })
    }

    /// An `NS` answer is only useful downstream when the addresses of the
    /// referenced nameservers are known.  When a reply carries `NS` records
    /// but no `A` glue for any of their targets, ask the same server for
    /// each target's address; any `NS` record whose target still has no
    /// glue afterwards is dropped from the answer section.
    async fn backfill_ns_glue(&self, address: Ipv4Addr, reply: &mut Message) {
        let targets = find_ns_targets(reply.answers());
        if targets.is_empty() {
            return;
        }

        let has_glue = reply
            .additionals()
            .iter()
            .any(|rr| matches!(rr.data(), Some(RData::A(_))) && targets.contains(rr.name()));

        if !has_glue {
            for target in &targets {
                match exchange_udp(address, target, RecordType::A).await {
                    Ok(glue) => {
                        for rr in glue.answers() {
                            if matches!(rr.data(), Some(RData::A(_))) {
                                reply.add_additional(rr.clone());
                            }
                        }
                    }
                    Err(error) => {
                        tracing::debug!(host = %target, %error, "failed to fetch glue for NS target");
                    }
                }
            }
        }

        let glued: HashSet<Name> = find_a_owner_names(reply.additionals())
            .into_iter()
            .map(|name| canonical_name(&name))
            .collect();

        for rr in reply.take_answers() {
            let keep = match rr.data() {
                Some(RData::NS(ns)) => glued.contains(&canonical_name(&ns.0)),
                _ => true,
            };
            if keep {
                reply.add_answer(rr);
            } else {
                tracing::trace!(rr = %crate::util::format_record(&rr), "dropping NS record without glue");
            }
        }
    }
}

/// Build the wire question for one exchange.  The recursion-desired bit is
/// set only for `NS` questions.
fn build_query(qname: &Name, qtype: RecordType) -> Message {
    let mut request = Message::new();
    request
        .set_id(rand::thread_rng().gen())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(qtype == RecordType::NS);
    request.add_query(Query::query(qname.clone(), qtype));
    request
}

/// One UDP exchange with a nameserver on port 53, bounded by [`TIMEOUT`].
async fn exchange_udp(
    address: Ipv4Addr,
    qname: &Name,
    qtype: RecordType,
) -> Result<Message, ResolutionError> {
    let request = build_query(qname, qtype);
    let bytes = request.to_vec().map_err(|error| ResolutionError::Network {
        message: error.to_string(),
    })?;

    match timeout(TIMEOUT, exchange_udp_notimeout(address, &bytes)).await {
        Ok(Ok(response)) if response_matches_request(&request, &response) => Ok(response),
        Ok(Ok(_)) => Err(ResolutionError::Network {
            message: format!("mismatched reply from {address}"),
        }),
        Ok(Err(error)) => Err(error),
        Err(_) => Err(ResolutionError::Timeout),
    }
}

/// Timeout-less version of `exchange_udp`.
async fn exchange_udp_notimeout(
    address: Ipv4Addr,
    bytes: &[u8],
) -> Result<Message, ResolutionError> {
    let network = |error: std::io::Error| ResolutionError::Network {
        message: error.to_string(),
    };

    let sock = UdpSocket::bind("0.0.0.0:0").await.map_err(network)?;
    sock.connect((address, 53)).await.map_err(network)?;
    sock.send(bytes).await.map_err(network)?;

    let mut buf = vec![0u8; 512];
    let len = sock.recv(&mut buf).await.map_err(network)?;

    Message::from_vec(&buf[..len]).map_err(|error| ResolutionError::Network {
        message: error.to_string(),
    })
}

/// Check that a reply corresponds to the request: same ID, and the
/// response bit set.  The response code is deliberately not checked - a
/// negative reply still carries the authority section the engine wants.
fn response_matches_request(request: &Message, response: &Message) -> bool {
    response.id() == request.id() && response.message_type() == MessageType::Response
}
