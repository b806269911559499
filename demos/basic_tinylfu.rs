//! Example demonstrating TinyLFU admission, expiry and eviction callbacks.
//!
//! Run with: cargo run --example basic_tinylfu

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tinylfu::{ConcurrentTinyLfuCache, Item, KeyAlreadyExists, TinyLfuCache};

fn main() {
    println!("=== TinyLFU Examples ===\n");

    // Example 1: set / get / add / delete
    println!("1. Basic operations");
    let mut cache = TinyLfuCache::new(100, 1_000);
    cache.set(Item::new("foo", "bar"));
    println!("   get foo -> {:?}", cache.get(&"foo"));
    println!(
        "   add foo again -> {:?}",
        cache.add(Item::new("foo", "baz")).err() == Some(KeyAlreadyExists)
    );
    println!("   delete foo -> {:?}", cache.delete(&"foo"));
    println!();

    // Example 2: scan resistance
    println!("2. Scan resistance");
    let mut cache: TinyLfuCache<u64, u64> = TinyLfuCache::new(100, 100_000);
    for k in 0..100 {
        cache.set(Item::new(k, k));
    }
    // Make keys 0..10 hot
    for _ in 0..4 {
        for k in 0..10 {
            cache.get(&k);
        }
    }
    // One-pass scan of 10k cold keys
    for k in 1_000..11_000 {
        cache.set(Item::new(k, k));
    }
    let hot_left = (0..10).filter(|k| cache.contains(k)).count();
    println!("   hot keys still cached after scan: {}/10", hot_left);
    println!(
        "   window={} probation={} protected={}",
        cache.window_len(),
        cache.probation_len(),
        cache.protected_len()
    );
    println!();

    // Example 3: eviction callbacks and expiry
    println!("3. Callbacks and expiry");
    let evicted = Arc::new(AtomicUsize::new(0));
    let mut cache = TinyLfuCache::new(10, 100);
    let counter = Arc::clone(&evicted);
    cache.set(
        Item::new("session", 42)
            .ttl(Duration::from_millis(10))
            .on_evict(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );
    std::thread::sleep(Duration::from_millis(20));
    println!("   get expired session -> {:?}", cache.get(&"session"));
    println!("   callbacks fired: {}", evicted.load(Ordering::SeqCst));
    println!();

    // Example 4: shared cache
    println!("4. Concurrent cache");
    let shared: ConcurrentTinyLfuCache<u32, String> = ConcurrentTinyLfuCache::builder(1_000)
        .samples(10_000)
        .build_concurrent();
    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    shared.set(Item::new(t * 100 + i, format!("v{}", i)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    println!("   entries: {}", shared.len());
    println!("   get 399 -> {:?}", shared.get(&399));
}
