//! Many threads against one limiter: successes never exceed what the tiers hold
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use cascade::limiters::{TierConfig, TierSet, TieredRateLimiter};

const NOW: i64 = 1_700_000_000_000;

fn limiter() -> TieredRateLimiter {
    TieredRateLimiter::new(
        TierSet::new(vec![
            TierConfig::new(50, 1),
            TierConfig::new(150, 1),
            TierConfig::new(300, 1),
        ])
        .unwrap(),
    )
}

#[test]
fn test_shared_client_never_overspends() {
    let rl = limiter();
    let capacity = rl.tiers().total_capacity() as usize;
    let allowed = AtomicUsize::new(0);

    // 16 x 100 = 1600 requests against 500 tokens, all at the same instant
    thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                for _ in 0..100 {
                    if rl.allow_request_at("shared", 1, NOW) {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(allowed.load(Ordering::SeqCst), capacity);
    let snapshot = rl.check_tokens_remaining_at("shared", NOW).unwrap();
    assert_eq!(snapshot.total_tokens, 0.0);
    assert_eq!(rl.len(), 1);
}

#[test]
fn test_mixed_weights_never_overspend() {
    let rl = limiter();
    let spent = AtomicUsize::new(0);

    thread::scope(|s| {
        for worker in 0..8u32 {
            let rl = &rl;
            let spent = &spent;
            s.spawn(move || {
                let weight = worker + 1;
                for _ in 0..50 {
                    if rl.allow_request_at("shared", weight, NOW) {
                        spent.fetch_add(weight as usize, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    let spent = spent.load(Ordering::SeqCst) as f64;
    let snapshot = rl.check_tokens_remaining_at("shared", NOW).unwrap();
    assert!(spent <= 500.0);
    assert_eq!(snapshot.total_tokens + spent, 500.0);
}

#[test]
fn test_many_clients_in_parallel() {
    let rl = limiter();

    thread::scope(|s| {
        for worker in 0..8 {
            let rl = &rl;
            s.spawn(move || {
                let client_id = format!("client-{}", worker);
                for _ in 0..500 {
                    assert!(rl.allow_request_at(&client_id, 1, NOW));
                }
                assert!(!rl.allow_request_at(&client_id, 1, NOW));
            });
        }
    });

    assert_eq!(rl.len(), 8);
}

#[test]
fn test_requests_survive_concurrent_eviction() {
    let rl = limiter();
    let capacity = rl.tiers().total_capacity() as usize;
    // "steady" is only ever seen at LATER, so a sweep with a cutoff between
    // NOW and LATER evicts every churning client but never it
    const LATER: i64 = NOW + 5_000;
    let steady_allowed = AtomicUsize::new(0);

    thread::scope(|s| {
        for worker in 0..4 {
            let rl = &rl;
            let steady_allowed = &steady_allowed;
            s.spawn(move || {
                for n in 0..2_000 {
                    let client_id = format!("client-{}", (worker + n) % 10);
                    rl.allow_request_at(&client_id, 3, NOW);
                    if n % 10 == 0 && rl.allow_request_at("steady", 1, LATER) {
                        steady_allowed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
        s.spawn(|| {
            for _ in 0..200 {
                rl.expire_idle_clients(2_000, LATER);
            }
        });
    });

    // 4 x 200 weight-1 requests against 500 tokens: exactly the capacity got through
    assert_eq!(steady_allowed.load(Ordering::SeqCst), capacity);
    let steady = rl.check_tokens_remaining_at("steady", LATER).unwrap();
    assert_eq!(steady.total_tokens, 0.0);

    for client_id in rl.get_all_client_keys() {
        let snapshot = rl.check_tokens_remaining_at(&client_id, NOW).unwrap();
        for (tokens, tier) in snapshot.tokens.iter().zip(rl.tiers().iter()) {
            assert!(*tokens >= 0.0);
            assert!(*tokens <= f64::from(tier.capacity));
        }
        if client_id != "steady" {
            // every live churning entry was debited in whole requests of 3
            assert_eq!((500.0 - snapshot.total_tokens) % 3.0, 0.0);
        }
    }
}
