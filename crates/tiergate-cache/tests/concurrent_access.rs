//! ---
//! tg_section: "05-decision-cache"
//! tg_subsection: "tests"
//! tg_type: "test"
//! tg_scope: "code"
//! tg_description: "Concurrent use of the tenant cache."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use tiergate_cache::TenantCache;
use tiergate_common::{CacheConfig, TenantId};

#[test]
fn concurrent_remember_returns_consistent_values() {
    let cache = Arc::new(TenantCache::in_memory(&CacheConfig::default(), true));
    let handles = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let tenant = TenantId::new(format!("tenant-{}", worker % 2));
                (0..100)
                    .map(|i| {
                        let key = format!("decision-{}", i % 10);
                        cache.remember(Some(&tenant), &key, None, || i % 10 == 0)
                    })
                    .filter(|allowed| *allowed)
                    .count()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
}

#[test]
fn forgetting_one_tenant_leaves_the_other_cached() {
    let cache = TenantCache::in_memory(&CacheConfig::default(), true);
    let acme = TenantId::from("acme");
    let globex = TenantId::from("globex");
    cache.put(Some(&acme), "scope", &"all", None);
    cache.put(Some(&globex), "scope", &"own", None);

    assert!(cache.forget(Some(&acme), "scope"));
    assert_eq!(cache.get(Some(&acme), "scope", String::new()), "");
    assert_eq!(cache.get(Some(&globex), "scope", String::new()), "own");
}
