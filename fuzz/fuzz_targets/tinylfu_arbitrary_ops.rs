#![no_main]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use tinylfu::{Item, KeyAlreadyExists, TinyLfuCache};

// Fuzz arbitrary operation sequences on TinyLfuCache
//
// The first two bytes pick capacity and sample window; each following pair is
// (op, key). Invariants are checked after every step, and every registered
// eviction callback must fire at most once.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = usize::from(data[0] % 32) + 1;
    let samples = usize::from(data[1]) + 1;
    let mut cache: TinyLfuCache<u8, u16> = TinyLfuCache::new(capacity, samples);
    let fired: Arc<Vec<AtomicUsize>> =
        Arc::new((0..data.len()).map(|_| AtomicUsize::new(0)).collect());
    let past = Instant::now().checked_sub(Duration::from_secs(1));

    for (step, pair) in data[2..].chunks_exact(2).enumerate() {
        let key = pair[1] % 48;
        let value = step as u16;

        match pair[0] % 7 {
            0 => {
                // set with callback
                let fired = Arc::clone(&fired);
                cache.set(Item::new(key, value).on_evict(move || {
                    fired[step].fetch_add(1, Ordering::SeqCst);
                }));
                assert_eq!(cache.peek(&key), Some(&value));
            },
            1 => {
                // add
                let live = cache.contains(&key);
                let result = cache.add(Item::new(key, value));
                if live {
                    assert_eq!(result, Err(KeyAlreadyExists));
                } else {
                    assert_eq!(result, Ok(()));
                }
            },
            2 | 3 => {
                // get
                let _ = cache.get(&key);
            },
            4 => {
                // delete
                cache.delete(&key);
                assert!(!cache.contains(&key));
            },
            5 => {
                // already-expired set
                if let Some(at) = past {
                    cache.set(Item::new(key, value).expire_at(at));
                    assert_eq!(cache.get(&key), None);
                }
            },
            _ => {
                // clear (rare)
                if pair[1] == 0xFF {
                    cache.clear();
                    assert!(cache.is_empty());
                }
            },
        }

        assert!(cache.len() <= capacity);
        cache.check_invariants().unwrap();
    }

    cache.clear();
    for counter in fired.iter() {
        assert!(counter.load(Ordering::SeqCst) <= 1);
    }
});
