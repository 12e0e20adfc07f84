//! Producer/consumer endpoints that carry Z-set deltas between operators.

use crate::zset::MultiSet;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared mutable queue of pending Z-sets, drained by a [`StreamReader`] and
/// fed by its owning [`StreamWriter`].
struct ReaderQueue<T> {
    pending: Vec<MultiSet<T>>,
}

impl<T> ReaderQueue<T> {
    fn new() -> Self {
        Self { pending: Vec::new() }
    }
}

/// A consumer endpoint attached to a [`StreamWriter`].
///
/// Every reader of a writer observes every Z-set the writer emits, in the
/// same order (broadcast fan-out).
pub struct StreamReader<T> {
    queue: Rc<RefCell<ReaderQueue<T>>>,
}

impl<T> StreamReader<T> {
    /// Drain and return all pending Z-sets, oldest first, leaving the queue
    /// empty.
    pub fn drain(&self) -> Vec<MultiSet<T>> {
        std::mem::take(&mut self.queue.borrow_mut().pending)
    }

    /// `true` iff no Z-sets are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().pending.is_empty()
    }
}

/// A producer endpoint. Owns every reader attached to it and broadcasts
/// every sent Z-set to all of them.
pub struct StreamWriter<T> {
    readers: RefCell<Vec<Rc<RefCell<ReaderQueue<T>>>>>,
}

impl<T> StreamWriter<T> {
    /// Create a writer with no readers yet attached.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            readers: RefCell::new(Vec::new()),
        })
    }

    /// Allocate a fresh reader attached to this writer.
    pub fn new_reader(&self) -> StreamReader<T> {
        let queue = Rc::new(RefCell::new(ReaderQueue::new()));
        self.readers.borrow_mut().push(queue.clone());
        StreamReader { queue }
    }

    /// Broadcast `data` to every reader's queue.
    pub fn send_data(&self, data: impl Into<MultiSet<T>>)
    where
        T: Clone,
    {
        let data = data.into();
        let readers = self.readers.borrow();
        let Some((last, rest)) = readers.split_last() else {
            return;
        };
        for reader in rest {
            reader.borrow_mut().pending.push(data.clone());
        }
        last.borrow_mut().pending.push(data);
    }
}
