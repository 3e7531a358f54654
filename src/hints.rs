use hickory_proto::rr::{Name, Record, RecordSet};
use hickory_proto::serialize::txt::Parser;

/// The root zone snippet compiled into the binary: the thirteen root
/// server `NS` records for `.` plus their IPv4 `A` glue.
const ROOT_HINTS: &str = include_str!("../data/root.hints");

const BAD_HINTS_MESSAGE: &str =
    "[INTERNAL ERROR] embedded root hints do not parse - aborting";

/// Parse the embedded root hints into records.
///
/// The hints are static data checked by the test suite, so a parse failure
/// here is a programmer error rather than a runtime condition.
pub(crate) fn root_hints() -> Vec<Record> {
    let (_origin, rrsets) = Parser::new(ROOT_HINTS, None, Some(Name::root()))
        .parse()
        .expect(BAD_HINTS_MESSAGE);

    rrsets
        .values()
        .flat_map(RecordSet::records_without_rrsigs)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use hickory_proto::rr::{RData, RecordType};

    use super::*;

    #[test]
    fn hints_hold_thirteen_roots_with_glue() {
        let records = root_hints();

        let ns_count = records
            .iter()
            .filter(|rr| rr.record_type() == RecordType::NS)
            .count();
        let a_count = records
            .iter()
            .filter(|rr| rr.record_type() == RecordType::A)
            .count();

        assert_eq!(13, ns_count);
        assert_eq!(13, a_count);
    }

    #[test]
    fn every_root_ns_has_matching_glue() {
        let records = root_hints();

        for rr in &records {
            if let Some(RData::NS(ns)) = rr.data() {
                assert!(
                    records
                        .iter()
                        .any(|glue| glue.record_type() == RecordType::A && *glue.name() == ns.0),
                    "no A glue for {}",
                    ns.0
                );
            }
        }
    }

    #[test]
    fn hint_ttls_are_long() {
        for rr in root_hints() {
            assert_eq!(3_600_000, rr.ttl());
        }
    }
}
