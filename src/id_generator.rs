use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing request id generator, one per session.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> IdGenerator {
        IdGenerator { next: AtomicU64::new(1) }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> IdGenerator {
        IdGenerator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ids_are_unique_and_monotone_under_contention() {
        let gen = Arc::new(IdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gen = Arc::clone(&gen);
            handles.push(thread::spawn(move || {
                (0..100).map(|_| gen.next()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
    }
}
