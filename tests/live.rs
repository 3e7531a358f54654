//! End-to-end resolutions against the public DNS hierarchy.
//!
//! These exercise the full pipeline - root hints, delegation walking,
//! parallel querying, CNAME chasing, and the cache - but they depend on
//! network access and on real-world zone contents, so they are ignored by
//! default.  Run them with `cargo test -- --ignored`.

use regex::Regex;

use rootward::util::format_record;
use rootward::{Message, Resolver};

fn section_matches(section: &[rootward::Record], pattern: &str) -> bool {
    let re = Regex::new(pattern).unwrap();
    section.iter().any(|rr| re.is_match(&format_record(rr)))
}

fn dump(message: &Message) -> String {
    rootward::util::format_message(message)
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn org_ns_resolves_to_afilias() {
    let resolver = Resolver::new();
    let response = resolver.resolve("org.", "NS").await.unwrap();

    assert!(
        section_matches(
            response.answers(),
            r"^org\.\t\d+\tIN\tNS\t[a-z0-9]+\.org\.afilias-nst\.(info|net|org)\.$",
        ),
        "no afilias NS in answer:\n{}",
        dump(&response)
    );
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn www_ghostbox_org_a_follows_the_cname() {
    let resolver = Resolver::new();
    let response = resolver.resolve("www.ghostbox.org", "A").await.unwrap();

    let saw_cname = section_matches(
        response.answers(),
        r"^www\.ghostbox\.org\.\t\d+\tIN\tCNAME\tghostbox\.org\.$",
    );
    let saw_chased_a = section_matches(response.answers(), r"^ghostbox\.org\.\t\d+\tIN\tA\t");

    assert!(
        saw_cname || saw_chased_a,
        "neither the CNAME nor a chased A record came back:\n{}",
        dump(&response)
    );
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn ghostbox_org_mx_comes_with_glue() {
    let resolver = Resolver::new();
    let response = resolver.resolve("ghostbox.org", "MX").await.unwrap();

    assert!(
        section_matches(
            response.answers(),
            r"^ghostbox\.org\.\t\d+\tIN\tMX\t\d+ mx2\.ghostbox\.org\.$",
        ),
        "no MX for mx2.ghostbox.org. in answer:\n{}",
        dump(&response)
    );
    assert!(
        section_matches(
            response.additionals(),
            r"^mx2\.ghostbox\.org\.\t\d+\tIN\tA\t\d+\.\d+\.\d+\.\d+$",
        ),
        "no A glue for the exchange in additional:\n{}",
        dump(&response)
    );
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn reverse_lookup_resolves_ptr() {
    let resolver = Resolver::new();
    let response = resolver
        .resolve("175.102.142.95.in-addr.arpa", "PTR")
        .await
        .unwrap();

    assert!(
        section_matches(
            response.answers(),
            r"^175\.102\.142\.95\.in-addr\.arpa\.\t\d+\tIN\tPTR\ta4091\.mcehosting\.atom86\.net\.$",
        ),
        "unexpected PTR answer:\n{}",
        dump(&response)
    );
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn missing_name_returns_the_parent_soa() {
    let resolver = Resolver::new();
    let response = resolver.resolve("ghostboxnotexisting.org", "A").await.unwrap();

    assert!(
        response.answers().is_empty(),
        "expected an empty answer section:\n{}",
        dump(&response)
    );
    assert!(
        section_matches(response.name_servers(), r"^org\.\t\d+\tIN\tSOA\t"),
        "no SOA for org. in authority:\n{}",
        dump(&response)
    );
}

#[tokio::test]
#[ignore = "queries the public DNS hierarchy"]
async fn second_resolution_is_served_from_cache() {
    let resolver = Resolver::new();

    let first = resolver.resolve("google.com", "A").await.unwrap();
    assert!(!first.answers().is_empty());
    let hits_before = resolver.metrics().cache_hits;

    let second = resolver.resolve("google.com", "A").await.unwrap();
    assert!(!second.answers().is_empty());
    assert!(
        resolver.metrics().cache_hits > hits_before,
        "second resolution should be answered from cache"
    );
}
