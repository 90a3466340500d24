//! Scenario and property tests for `leak_registry`.
//!
//! These exercise the public API the way a caller would: register memory from a few call
//! sites, release some of it and check that reports describe exactly what is left.

use std::collections::HashMap;

use leak_registry::{
    Allocation, CallSite, Error, Registry, Release, ReportScope, UntrackedReleasePolicy,
    call_site,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Releases every handle, asserting each one was tracked.
fn release_all<'a>(registry: &Registry, allocations: impl IntoIterator<Item = &'a Allocation>) {
    for allocation in allocations {
        // SAFETY: Every handle passed here was registered with this registry and is released
        // exactly once.
        let outcome = unsafe { registry.deregister(Some(*allocation)) }.unwrap();
        assert_eq!(outcome, Release::Tracked);
    }
}

#[test]
fn released_site_disappears_from_report() {
    let registry = Registry::new();
    let site_a = CallSite::new("memoryanalysis.c", 87);
    let site_b = CallSite::new("memoryanalysis.c", 88);

    let a = registry.register(400, site_a.clone()).unwrap();
    let b = registry.register(200, site_b.clone()).unwrap();

    release_all(&registry, [&b]);

    let report_a = registry.query_by_site(&site_a);
    assert_eq!(report_a.count(), 1);
    assert_eq!(report_a.entries()[0].size(), 400);
    assert_eq!(report_a.entries()[0].site(), &site_a);

    let report_b = registry.query_by_site(&site_b);
    assert_eq!(report_b.count(), 0);
    assert!(report_b.entries().is_empty());

    release_all(&registry, [&a]);
}

#[test]
fn same_site_twice_reports_both() {
    let registry = Registry::new();
    let site = CallSite::new("parser.rs", 12);

    let first = registry.register(96, site.clone()).unwrap();
    let second = registry.register(96, site.clone()).unwrap();
    assert_ne!(first.address(), second.address());

    let report = registry.query_by_site(&site);
    assert_eq!(report.count(), 2);
    assert_eq!(report.total_bytes(), 192);

    release_all(&registry, [&first, &second]);
}

#[test]
fn query_returns_exactly_the_site_entries() {
    let registry = Registry::new();
    let sites = [
        CallSite::new("a.rs", 1),
        CallSite::new("a.rs", 2),
        CallSite::new("b.rs", 1),
    ];

    let mut allocations = Vec::new();
    for (index, size) in [8_usize, 16, 24, 32, 40, 48, 56].into_iter().enumerate() {
        let site = &sites[index % sites.len()];
        allocations.push((registry.register(size, site.clone()).unwrap(), site.clone()));
    }

    for site in &sites {
        let mut expected: Vec<usize> = allocations
            .iter()
            .filter(|(_, s)| s == site)
            .map(|(allocation, _)| allocation.size())
            .collect();
        expected.sort_unstable();

        let report = registry.query_by_site(site);
        let mut actual: Vec<usize> = report.entries().iter().map(|e| e.size()).collect();
        actual.sort_unstable();

        assert_eq!(actual, expected, "entries for {site}");
        assert!(report.entries().iter().all(|e| e.site() == site));
    }

    release_all(&registry, allocations.iter().map(|(allocation, _)| allocation));
    assert!(registry.is_empty());
}

#[test]
fn untracked_release_does_not_change_count() {
    let registry = Registry::new();
    let site = CallSite::new("a.rs", 1);

    let kept = registry.register(64, site.clone()).unwrap();
    let foreign = Registry::new().register(64, site.clone()).unwrap();

    // SAFETY: Both registries use the system allocator and `foreign` is released exactly once.
    // The registry that produced it has already been dropped without releasing it.
    let outcome = unsafe { registry.deregister(Some(foreign)) }.unwrap();

    assert_eq!(outcome, Release::Untracked);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.query_by_site(&site).count(), 1);

    release_all(&registry, [&kept]);
}

#[test]
fn null_release_is_noop() {
    let registry = Registry::new();

    // SAFETY: Nothing is released.
    let outcome = unsafe { registry.deregister(None) }.unwrap();

    assert_eq!(outcome, Release::Null);
    assert!(registry.is_empty());
}

#[test]
fn double_release_is_rejected_when_configured() {
    let registry = Registry::builder()
        .untracked_release_policy(UntrackedReleasePolicy::Reject)
        .build();
    let allocation = registry.register(32, CallSite::new("a.rs", 1)).unwrap();

    release_all(&registry, [&allocation]);

    // SAFETY: Under the reject policy an untracked handle is never released.
    let result = unsafe { registry.deregister(Some(allocation)) };

    assert!(matches!(result, Err(Error::UntrackedRelease { .. })));
    assert!(registry.is_empty());
}

#[test]
fn report_text_matches_expected_format() {
    let registry = Registry::new();
    let site = CallSite::new("memoryanalysis.c", 87);

    let empty = registry.query_by_site(&site);
    assert_eq!(
        empty.to_string(),
        "No memory leaks detected in file: memoryanalysis.c"
    );

    let allocation = registry.register(400, site.clone()).unwrap();
    let report = registry.query_by_source("memoryanalysis.c");

    assert_eq!(
        report.scope(),
        &ReportScope::Source("memoryanalysis.c".to_string())
    );
    assert_eq!(
        report.to_string(),
        "Memory leak detected: 400 bytes at memoryanalysis.c:87\n\
         Total 1 memory leak(s) detected in file: memoryanalysis.c"
    );

    release_all(&registry, [&allocation]);
}

#[test]
fn call_site_macro_is_queryable_by_file() {
    let registry = Registry::new();

    let allocation = registry.register(10, call_site!()).unwrap();

    assert_eq!(registry.query_by_source(file!()).count(), 1);

    release_all(&registry, [&allocation]);
}

#[test]
fn random_sequences_keep_count_consistent() {
    const STEPS: usize = 2_000;
    const SITE_COUNT: u32 = 5;

    let mut rng = StdRng::seed_from_u64(0x1ea4_5eed);

    // Reject policy lets us present stale handles without releasing them a second time.
    let registry = Registry::builder()
        .untracked_release_policy(UntrackedReleasePolicy::Reject)
        .build();

    let sites: Vec<CallSite> = (0..SITE_COUNT)
        .map(|line| CallSite::new("model.rs", line))
        .collect();

    let mut live: Vec<(Allocation, u32)> = Vec::new();
    let mut stale: Vec<Allocation> = Vec::new();
    let mut successful_registers = 0_usize;
    let mut matched_deregisters = 0_usize;

    for _ in 0..STEPS {
        let roll = rng.random_range(0..10);

        if roll < 5 || live.is_empty() {
            let line = rng.random_range(0..SITE_COUNT);
            let size = rng.random_range(1..=512_usize);

            let allocation = registry
                .register(size, sites[line as usize].clone())
                .unwrap();
            live.push((allocation, line));
            successful_registers += 1;
        } else if roll < 9 {
            let index = rng.random_range(0..live.len());
            let (allocation, _) = live.swap_remove(index);

            // SAFETY: Live handle from this registry, released once.
            let outcome = unsafe { registry.deregister(Some(allocation)) }.unwrap();
            assert_eq!(outcome, Release::Tracked);

            matched_deregisters += 1;
            stale.push(allocation);
        } else if let Some(&allocation) = stale.last() {
            // The allocator may have reused the address for a live allocation.
            let reused = live
                .iter()
                .any(|(candidate, _)| candidate.address() == allocation.address());

            if !reused {
                // SAFETY: Untracked under the reject policy, so nothing is released.
                let result = unsafe { registry.deregister(Some(allocation)) };
                assert!(matches!(result, Err(Error::UntrackedRelease { .. })));
            }
        }

        assert_eq!(registry.len(), successful_registers - matched_deregisters);
    }

    let mut expected_per_site: HashMap<u32, (usize, u64)> = HashMap::new();
    for (allocation, line) in &live {
        let entry = expected_per_site.entry(*line).or_default();
        entry.0 += 1;
        entry.1 += allocation.size() as u64;
    }

    for (line, site) in (0..SITE_COUNT).zip(&sites) {
        let (count, bytes) = expected_per_site.get(&line).copied().unwrap_or_default();
        let report = registry.query_by_site(site);

        assert_eq!(report.count(), count, "count for {site}");
        assert_eq!(report.total_bytes(), bytes, "bytes for {site}");
    }

    let expected_bytes: u64 = live.iter().map(|(a, _)| a.size() as u64).sum();
    assert_eq!(registry.live_bytes(), expected_bytes);

    release_all(&registry, live.iter().map(|(allocation, _)| allocation));
    assert!(registry.is_empty());
}
