//! Helpers for working with names and record sets: canonicalisation,
//! extraction of targets from RDATA, and the tab-separated text form of a
//! record.

use std::net::Ipv4Addr;

use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RData, Record};

use crate::ResolutionError;

/// The canonical form of a name: lowercase and fully qualified.  All
/// comparisons and cache keys use this form.
pub(crate) fn canonical_name(name: &Name) -> Name {
    let mut canonical = name.to_lowercase();
    canonical.set_fqdn(true);
    canonical
}

/// Parse a textual domain name into canonical form, appending the trailing
/// dot when it is missing.
pub(crate) fn parse_name(input: &str) -> Result<Name, ResolutionError> {
    let mut text = input.to_ascii_lowercase();
    if !text.ends_with('.') {
        text.push('.');
    }

    match Name::from_ascii(&text) {
        Ok(name) => Ok(canonical_name(&name)),
        Err(_) => Err(ResolutionError::InvalidName {
            name: input.to_string(),
        }),
    }
}

/// The parent zone of a name: the name with its leftmost label removed.
/// The root has no parent.
pub(crate) fn parent_name(name: &Name) -> Option<Name> {
    if name.is_root() {
        None
    } else {
        Some(name.base_name())
    }
}

/// Interpret a nameserver "name" as an IPv4 literal, if it is one.
/// Delegations normally carry hostnames, but an address is accepted and
/// used as-is.
pub(crate) fn ipv4_literal(name: &Name) -> Option<Ipv4Addr> {
    let text = name.to_utf8();
    text.trim_end_matches('.').parse().ok()
}

/// The addresses of all `A` records in the set.
pub(crate) fn find_a(rrs: &[Record]) -> Vec<Ipv4Addr> {
    rrs.iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::A(a)) => Some(a.0),
            _ => None,
        })
        .collect()
}

/// The owner names of all `A` records in the set.
pub(crate) fn find_a_owner_names(rrs: &[Record]) -> Vec<Name> {
    rrs.iter()
        .filter(|rr| matches!(rr.data(), Some(RData::A(_))))
        .map(|rr| rr.name().clone())
        .collect()
}

/// The target hostnames of all `NS` records in the set.
pub(crate) fn find_ns_targets(rrs: &[Record]) -> Vec<Name> {
    rrs.iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::NS(ns)) => Some(ns.0.clone()),
            _ => None,
        })
        .collect()
}

/// The canonical targets of all `CNAME` records in the set, in order.
pub(crate) fn find_cname_targets(rrs: &[Record]) -> Vec<Name> {
    rrs.iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::CNAME(cname)) => Some(cname.0.clone()),
            _ => None,
        })
        .collect()
}

/// The exchange hostnames of all `MX` records in the set.
pub(crate) fn find_mx_exchanges(rrs: &[Record]) -> Vec<Name> {
    rrs.iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::MX(mx)) => Some(mx.exchange().clone()),
            _ => None,
        })
        .collect()
}

/// Every hostname in the set which can be queried as a nameserver: `NS`
/// targets, plus the MNAME of any `SOA` record.
///
/// Treating the SOA MNAME as a nameserver is what lets a negative answer
/// from a parent zone still give the resolver a host to ask, so
/// NXDOMAIN-shaped lookups come back with the parent's SOA attached rather
/// than a dead end.
pub(crate) fn find_nameserver_hosts(rrs: &[Record]) -> Vec<Name> {
    rrs.iter()
        .filter_map(|rr| match rr.data() {
            Some(RData::NS(ns)) => Some(ns.0.clone()),
            Some(RData::SOA(soa)) => Some(soa.mname().clone()),
            _ => None,
        })
        .collect()
}

/// Render a record in the conventional tab-separated zone form:
/// `name<TAB>ttl<TAB>class<TAB>type<TAB>rdata`.
pub fn format_record(rr: &Record) -> String {
    let rdata = match rr.data() {
        Some(RData::A(a)) => a.0.to_string(),
        Some(RData::NS(ns)) => ns.0.to_string(),
        Some(RData::CNAME(cname)) => cname.0.to_string(),
        Some(RData::PTR(ptr)) => ptr.0.to_string(),
        Some(RData::MX(mx)) => format!("{} {}", mx.preference(), mx.exchange()),
        Some(RData::SOA(soa)) => format!(
            "{} {} {} {} {} {} {}",
            soa.mname(),
            soa.rname(),
            soa.serial(),
            soa.refresh(),
            soa.retry(),
            soa.expire(),
            soa.minimum()
        ),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    };

    format!(
        "{}\t{}\t{}\t{}\t{}",
        rr.name(),
        rr.ttl(),
        rr.dns_class(),
        rr.record_type(),
        rdata
    )
}

/// Render a whole message, one record per line, sections in answer /
/// authority / additional order.
pub fn format_message(message: &Message) -> String {
    let mut lines = Vec::new();
    for (heading, section) in [
        (";; ANSWER", message.answers()),
        (";; AUTHORITY", message.name_servers()),
        (";; ADDITIONAL", message.additionals()),
    ] {
        if !section.is_empty() {
            lines.push(heading.to_string());
            for rr in section {
                lines.push(format_record(rr));
            }
        }
    }
    lines.join("\n")
}
