//! Behavioural tests for the query log engine
//!
//! These walk the public API through the scenarios the engine must support:
//! memory and disk merging, pagination, scan caps, ignored hosts, restarts,
//! retention and clearing.

mod common;

use std::net::Ipv4Addr;

use hickory_proto::rr::{DNSClass, RecordType};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use common::{clients, first_answer, hosts, numbered, open, params, settings};
use quell_core::{FilterResult, Reason};
use quell_querylog::{
    ConfigError, FilteringStatus, QueryLog, QueryLogError, SearchCriterion, SearchParams,
};

// ============================================================================
// Memory and disk merging
// ============================================================================

#[tokio::test]
async fn test_query_log_merges_memory_and_files() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    // First file
    log.add(params("example.org", Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 1)));
    log.flush(true).await.unwrap();
    log.rotate().await.unwrap();

    // Second file
    log.add(params("example.org", Ipv4Addr::new(1, 1, 1, 2), Ipv4Addr::new(2, 2, 2, 2)));
    log.flush(true).await.unwrap();
    log.rotate().await.unwrap();

    // Memory only
    log.add(params("test.example.org", Ipv4Addr::new(1, 1, 1, 3), Ipv4Addr::new(2, 2, 2, 3)));
    log.add(params("example.com", Ipv4Addr::new(1, 1, 1, 4), Ipv4Addr::new(2, 2, 2, 4)));

    assert_eq!(log.segments().len(), 2);
    assert_eq!(log.buffered(), 2);

    let all = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(all.matched, 4);
    assert_eq!(
        hosts(&all),
        vec!["example.com", "test.example.org", "example.org", "example.org"]
    );
    assert_eq!(clients(&all), vec!["2.2.2.4", "2.2.2.3", "2.2.2.2", "2.2.2.1"]);

    // Answers survive the trip through disk byte-for-byte
    for (entry, ip) in all.entries.iter().zip(["1.1.1.4", "1.1.1.3", "1.1.1.2", "1.1.1.1"]) {
        assert!(first_answer(entry).unwrap().contains(ip));
    }
    let on_disk = &all.entries[3];
    assert_eq!(on_disk.answer, on_disk.orig_answer);
    assert_eq!(on_disk.result.reason, Reason::Rewritten);
    assert_eq!(on_disk.result.rules[0].text, "SomeRule");
    assert_eq!(on_disk.result.service_name.as_deref(), Some("SomeService"));
    assert_eq!(on_disk.upstream.as_deref(), Some("upstream"));

    let strict_host = SearchParams::new().with_criterion(SearchCriterion::strict("TEST.example.org"));
    let found = log.search(&strict_host).await.unwrap();
    assert_eq!(clients(&found), vec!["2.2.2.3"]);

    let partial_host = SearchParams::new().with_criterion(SearchCriterion::contains("example.ORG"));
    let found = log.search(&partial_host).await.unwrap();
    assert_eq!(clients(&found), vec!["2.2.2.3", "2.2.2.2", "2.2.2.1"]);

    let strict_client = SearchParams::new().with_criterion(SearchCriterion::strict("2.2.2.2"));
    let found = log.search(&strict_client).await.unwrap();
    assert_eq!(clients(&found), vec!["2.2.2.2"]);

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_partial_address_matches_regardless_of_host() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    log.add(params("one.example", Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 1)));
    log.add(params("two.example", Ipv4Addr::new(1, 1, 1, 2), Ipv4Addr::new(2, 2, 2, 2)));
    log.flush(true).await.unwrap();
    log.add(params("three.example", Ipv4Addr::new(1, 1, 1, 3), Ipv4Addr::new(3, 3, 3, 3)));

    let found = log
        .search(&SearchParams::new().with_criterion(SearchCriterion::contains("2.2.2")))
        .await
        .unwrap();
    assert_eq!(hosts(&found), vec!["two.example", "one.example"]);
    assert_eq!(found.matched, 2);

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_records_survive_flush_and_rotation() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    for n in 1..=5 {
        log.add(numbered(n));
    }
    assert_eq!(log.flush(true).await.unwrap(), 5);
    log.rotate().await.unwrap();
    assert_eq!(log.buffered(), 0);

    for n in 6..=8 {
        log.add(numbered(n));
    }

    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(result.matched, 8);
    let expected: Vec<String> = (1..=8).rev().map(|n| format!("host{n}.example")).collect();
    assert_eq!(hosts(&result), expected);

    log.close().await.unwrap();
}

// ============================================================================
// Pagination and scan caps
// ============================================================================

#[tokio::test]
async fn test_pagination_across_memory_and_disk() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    for n in 0..10 {
        log.add(params("disk.example", Ipv4Addr::new(1, 1, 1, n), Ipv4Addr::new(2, 2, 2, n)));
    }
    log.flush(true).await.unwrap();
    for n in 0..10 {
        log.add(params("mem.example", Ipv4Addr::new(1, 1, 1, n), Ipv4Addr::new(2, 2, 2, n)));
    }

    let page = |offset| SearchParams::new().with_offset(offset).with_limit(10);

    let first = log.search(&page(0)).await.unwrap();
    assert_eq!(first.entries.len(), 10);
    assert!(first.entries.iter().all(|e| e.qhost == "mem.example"));
    assert_eq!(first.matched, 20);

    let second = log.search(&page(10)).await.unwrap();
    assert_eq!(second.entries.len(), 10);
    assert!(second.entries.iter().all(|e| e.qhost == "disk.example"));

    let partial = log.search(&page(15)).await.unwrap();
    assert_eq!(partial.entries.len(), 5);

    let past_end = log.search(&page(20)).await.unwrap();
    assert!(past_end.entries.is_empty());
    assert_eq!(past_end.matched, 20);

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_pages_are_slices_of_the_full_result() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    for n in 1..=6 {
        log.add(numbered(n));
    }
    log.flush(true).await.unwrap();
    log.rotate().await.unwrap();
    for n in 7..=9 {
        log.add(numbered(n));
    }

    let full = hosts(&log.search(&SearchParams::new()).await.unwrap());
    assert_eq!(full.len(), 9);

    for offset in 0..11 {
        for limit in 0..5 {
            let params = SearchParams::new().with_offset(offset).with_limit(limit);
            let page = hosts(&log.search(&params).await.unwrap());
            let start = offset.min(full.len());
            let end = (offset + limit).min(full.len());
            assert_eq!(page, full[start..end], "offset {offset} limit {limit}");
        }
    }

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_max_file_scan_entries() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    for n in 1..=10 {
        log.add(numbered(n));
    }
    log.flush(true).await.unwrap();
    log.rotate().await.unwrap();

    let capped = SearchParams::new().with_max_file_scan_entries(5);
    let result = log.search(&capped).await.unwrap();
    assert_eq!(result.entries.len(), 5);
    assert_eq!(result.matched, 5);
    assert_eq!(hosts(&result)[0], "host10.example");

    let unbounded = SearchParams::new().with_max_file_scan_entries(0);
    assert_eq!(log.search(&unbounded).await.unwrap().entries.len(), 10);

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_scan_cap_does_not_limit_memory() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    for n in 1..=4 {
        log.add(numbered(n));
    }
    log.flush(true).await.unwrap();
    for n in 5..=8 {
        log.add(numbered(n));
    }

    let capped = SearchParams::new().with_max_file_scan_entries(1);
    let result = log.search(&capped).await.unwrap();
    assert_eq!(result.matched, 5);
    assert_eq!(hosts(&result)[4], "host4.example");

    log.close().await.unwrap();
}

// ============================================================================
// Memory-only operation
// ============================================================================

#[tokio::test]
async fn test_file_disabled_keeps_newest() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), false, 2).await;

    for n in 1..=3 {
        log.add(numbered(n));
    }

    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(hosts(&result), vec!["host3.example", "host2.example"]);
    assert_eq!(result.matched, 2);

    // Persistence calls are accepted and do nothing
    assert_eq!(log.flush(true).await.unwrap(), 0);
    log.rotate().await.unwrap();
    assert!(log.segments().is_empty());
    log.close().await.unwrap();

    let mut dir_entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    assert!(dir_entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_bound_for_many_records() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), false, 7).await;

    for n in 1..=50 {
        log.add(numbered(n));
    }

    let result = log.search(&SearchParams::new().with_limit(1000)).await.unwrap();
    let expected: Vec<String> = (44..=50).rev().map(|n| format!("host{n}.example")).collect();
    assert_eq!(hosts(&result), expected);
    log.close().await.unwrap();
}

// ============================================================================
// Ignored hosts
// ============================================================================

#[tokio::test]
async fn test_should_log() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(dir.path(), false, 10);
    s.ignored = vec!["ignor.ed".into(), "ignored.to".into()];
    let log = QueryLog::open(s.validate().unwrap()).await.unwrap();

    assert!(!log.should_log("ignor.ed", RecordType::A, DNSClass::IN));
    assert!(!log.should_log("ignored.to", RecordType::AAAA, DNSClass::CH));
    assert!(!log.should_log("IGNORED.TO.", RecordType::TXT, DNSClass::IN));
    assert!(log.should_log("example.com", RecordType::A, DNSClass::IN));
    assert!(log.should_log("sub.ignor.ed", RecordType::A, DNSClass::IN));

    log.close().await.unwrap();
}

#[test]
fn test_bad_ignored_hosts_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(dir.path(), true, 10);

    s.ignored = vec!["ok.example".into(), "  ".into()];
    assert_eq!(s.validate().unwrap_err(), ConfigError::EmptyIgnored { index: 1 });

    s.ignored = vec!["bad host.example".into()];
    assert!(matches!(
        s.validate().unwrap_err(),
        ConfigError::MalformedIgnored { index: 0, .. }
    ));

    s.ignored = vec!["dup.example".into(), "DUP.example".into()];
    assert!(matches!(
        s.validate().unwrap_err(),
        ConfigError::DuplicateIgnored { index: 1, .. }
    ));
}

// ============================================================================
// Filtering status
// ============================================================================

#[tokio::test]
async fn test_filtering_status_search() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    let blocked = numbered(1).with_result(FilterResult::filtered(Reason::FilteredBlockList));
    let allowed = numbered(2).with_result(FilterResult {
        reason: Reason::NotFilteredAllowList,
        ..FilterResult::not_filtered()
    });
    let plain = numbered(3).with_result(FilterResult::not_filtered());

    log.add(blocked);
    log.add(allowed);
    log.flush(true).await.unwrap();
    log.add(plain);

    let by_status = |status| SearchParams::new().with_criterion(SearchCriterion::status(status));

    let found = log.search(&by_status(FilteringStatus::Blocked)).await.unwrap();
    assert_eq!(hosts(&found), vec!["host1.example"]);

    let found = log.search(&by_status(FilteringStatus::Whitelisted)).await.unwrap();
    assert_eq!(hosts(&found), vec!["host2.example"]);

    let found = log.search(&by_status(FilteringStatus::Processed)).await.unwrap();
    assert_eq!(hosts(&found), vec!["host3.example"]);

    let combined = by_status(FilteringStatus::Filtered).with_criterion(SearchCriterion::contains("2.2.2.1"));
    let found = log.search(&combined).await.unwrap();
    assert_eq!(hosts(&found), vec!["host1.example"]);

    log.close().await.unwrap();
}

// ============================================================================
// Restarts, retention and clearing
// ============================================================================

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = TempDir::new().unwrap();

    let log = open(dir.path(), true, 100).await;
    log.add(numbered(1));
    log.add(numbered(2));
    log.close().await.unwrap();

    let log = open(dir.path(), true, 100).await;
    let segments = log.segments();
    assert_eq!(segments.len(), 1);
    assert!(!segments[0].active);

    log.add(numbered(3));
    log.flush(true).await.unwrap();

    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(
        hosts(&result),
        vec!["host3.example", "host2.example", "host1.example"]
    );

    // New records go to a new segment, never to the old one
    let segments = log.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].info.seq, 1);
    assert_eq!(segments[1].info.seq, 2);
    assert!(segments[1].active);

    log.close().await.unwrap();
}

#[tokio::test]
async fn test_retention_keeps_newest_segments() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(dir.path(), true, 100);
    s.max_rotated_files = Some(2);
    let log = QueryLog::open(s.validate().unwrap()).await.unwrap();

    for n in 1..=4 {
        log.add(numbered(n));
        log.flush(true).await.unwrap();
        log.rotate().await.unwrap();
    }

    let seqs: Vec<u64> = log.segments().iter().map(|s| s.info.seq).collect();
    assert_eq!(seqs, vec![3, 4]);

    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(hosts(&result), vec!["host4.example", "host3.example"]);
    log.close().await.unwrap();

    // Tighter retention applies when reopening
    s.max_rotated_files = Some(1);
    let log = QueryLog::open(s.validate().unwrap()).await.unwrap();
    let seqs: Vec<u64> = log.segments().iter().map(|s| s.info.seq).collect();
    assert_eq!(seqs, vec![4]);
    log.close().await.unwrap();
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;

    log.add(numbered(1));
    log.flush(true).await.unwrap();
    log.rotate().await.unwrap();
    log.add(numbered(2));
    log.flush(true).await.unwrap();
    log.add(numbered(3));

    log.clear().await.unwrap();
    assert_eq!(log.buffered(), 0);
    assert!(log.segments().is_empty());
    assert_eq!(log.search(&SearchParams::new()).await.unwrap().matched, 0);

    // Still usable afterwards
    log.add(numbered(4));
    log.flush(true).await.unwrap();
    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(hosts(&result), vec!["host4.example"]);
    log.close().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_records_are_skipped() {
    let dir = TempDir::new().unwrap();

    let log = open(dir.path(), true, 100).await;
    log.add(numbered(1));
    log.add(numbered(2));
    log.close().await.unwrap();

    // Damage the segment between two good records
    let path = log.segments()[0].info.path.clone();
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let mut lines: Vec<&str> = content.lines().collect();
    lines.insert(1, "{\"t\": broken");
    tokio::fs::write(&path, format!("{}\n", lines.join("\n"))).await.unwrap();

    let log = open(dir.path(), true, 100).await;
    let result = log.search(&SearchParams::new()).await.unwrap();
    assert_eq!(hosts(&result), vec!["host2.example", "host1.example"]);
    assert_eq!(result.skipped, 1);
    log.close().await.unwrap();
}

#[tokio::test]
async fn test_operations_after_close() {
    let dir = TempDir::new().unwrap();
    let log = open(dir.path(), true, 100).await;
    log.add(numbered(1));
    assert_ok!(log.close().await);

    // A second close is harmless; everything else is refused
    assert_ok!(log.close().await);
    log.add(numbered(2));
    assert!(matches!(
        log.search(&SearchParams::new()).await,
        Err(QueryLogError::Closed)
    ));
    assert_err!(log.flush(true).await);
    assert_err!(log.rotate().await);
    assert!(matches!(log.clear().await, Err(QueryLogError::Closed)));
    assert!(log.is_closed());

    // The record added before close was persisted
    let log = open(dir.path(), true, 100).await;
    let result = assert_ok!(log.search(&SearchParams::new()).await);
    assert_eq!(hosts(&result), vec!["host1.example"]);
    log.close().await.unwrap();
}
