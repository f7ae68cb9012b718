use std::sync::{Arc, RwLock};

/// Single-writer latest-value cell. Publishing overwrites, readers get
/// whatever was published last without waiting on the writer.
#[derive(Debug)]
pub struct Latest<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Latest<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Latest<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        // a poisoned lock still holds a whole Arc
        match self.inner.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    pub fn snapshot(&self) -> Arc<T> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_overwrites() {
        let cell = Latest::new(1);
        assert_eq!(*cell.snapshot(), 1);

        cell.publish(2);
        cell.publish(3);
        assert_eq!(*cell.snapshot(), 3);
    }

    #[test]
    fn test_snapshot_outlives_publish() {
        let cell = Latest::new(vec![1, 2]);
        let before = cell.snapshot();
        cell.publish(vec![3]);

        assert_eq!(*before, vec![1, 2]);
        assert_eq!(*cell.snapshot(), vec![3]);
    }

    #[test]
    fn test_cross_thread() {
        let cell: Latest<Vec<u32>> = Latest::default();
        let writer = cell.clone();

        thread::spawn(move || {
            for i in 0..100 {
                writer.publish(vec![i]);
            }
        })
        .join()
        .unwrap();

        assert_eq!(*cell.snapshot(), vec![99]);
    }
}
