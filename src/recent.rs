use std::sync::Mutex;

/// Bounded FIFO of the last `capacity` broadcast lines, backed by a circular
/// buffer. `append` and `snapshot` are both O(capacity) at worst (snapshot
/// allocates a `Vec` of the current population; append is O(1)).
pub struct RecentRing {
    capacity: usize,
    inner: Mutex<RingInner>,
}

struct RingInner {
    slots: Vec<String>,
    cursor: usize,
    len: usize,
}

impl RecentRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "recent-message ring capacity must be > 0");
        Self {
            capacity,
            inner: Mutex::new(RingInner {
                slots: vec![String::new(); capacity],
                cursor: 0,
                len: 0,
            }),
        }
    }

    /// Overwrite the slot at the cursor and advance it, saturating `len` at
    /// `capacity`.
    pub fn append(&self, line: String) {
        let mut inner = self.inner.lock().unwrap();
        let cursor = inner.cursor;
        inner.slots[cursor] = line;
        inner.cursor = (cursor + 1) % self.capacity;
        if inner.len < self.capacity {
            inner.len += 1;
        }
    }

    /// Oldest-first snapshot of the current population.
    pub fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let start = (inner.cursor + self.capacity - inner.len) % self.capacity;
        (0..inner.len)
            .map(|i| inner.slots[(start + i) % self.capacity].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order_under_capacity() {
        let ring = RecentRing::new(20);
        ring.append("a".into());
        ring.append("b".into());
        ring.append("c".into());
        assert_eq!(ring.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn evicts_oldest_first_past_capacity() {
        let ring = RecentRing::new(3);
        for i in 0..5 {
            ring.append(i.to_string());
        }
        assert_eq!(ring.snapshot(), vec!["2", "3", "4"]);
    }

    #[test]
    fn snapshot_after_r_plus_k_equals_last_r_in_order() {
        let r = 4;
        let ring = RecentRing::new(r);
        let k = 7;
        for i in 0..(r + k) {
            ring.append(i.to_string());
        }
        let expected: Vec<String> = ((k)..(r + k)).map(|i| i.to_string()).collect();
        assert_eq!(ring.snapshot(), expected);
    }
}
