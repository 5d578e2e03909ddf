use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed list of work items that several threads can take from. Every item is handed
/// out exactly once, in order.
pub struct WorkQueue<T> {
    work: Vec<T>,
    next: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(work: Vec<T>) -> Self {
        Self {
            work,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next_index(&self) -> Option<(usize, &T)> {
        let cur = self.next.fetch_add(1, Ordering::SeqCst);
        self.work.get(cur).map(|t| (cur, t))
    }

    /// Takes everything that hasn't been handed out yet
    pub fn drain_remaining(&self) -> impl Iterator<Item = (usize, &T)> {
        std::iter::from_fn(|| self.next_index())
    }

    pub fn len(&self) -> usize {
        self.work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.is_empty()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.work
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hands_out_in_order_once() {
        let queue = WorkQueue::new(vec!['a', 'b', 'c']);
        assert_eq!(Some((0, &'a')), queue.next_index());
        assert_eq!(Some((1, &'b')), queue.next_index());
        assert_eq!(vec![(2, &'c')], queue.drain_remaining().collect::<Vec<_>>());
        assert_eq!(None, queue.next_index());
        assert_eq!(3, queue.len());
        assert!(!queue.is_empty());
        assert!(WorkQueue::<char>::new(vec![]).is_empty());
    }

    #[test]
    fn shared_between_threads() {
        let queue = WorkQueue::new((0..100).collect::<Vec<u32>>());
        let sums: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| queue.drain_remaining().map(|(_, x)| *x).sum::<u32>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!((0..100).sum::<u32>(), sums.into_iter().sum::<u32>());
    }
}
