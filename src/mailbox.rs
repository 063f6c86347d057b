//! Blocking single-slot hand-off between the listener thread and the caller thread.
//!
//! A [`Mailbox`] is a rendezvous point, not a queue: the protocol alternates strictly, so at
//! most one value is ever in flight per direction. `put` and `take` block without timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{BridgeError, Result};
use crate::message::{ActionMessage, StateMessage};

/// Single-slot blocking channel of `T`.
///
/// Cloning yields another handle on the same slot. Both ends live in every handle, so a
/// `take` never observes a disconnect: a caller blocked here stays blocked until some handle
/// puts a value.
#[derive(Debug)]
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    puts: Arc<AtomicUsize>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Mailbox {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            puts: self.puts.clone(),
        }
    }
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Mailbox {
            tx,
            rx,
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deposit `value`, blocking while the slot is occupied.
    pub fn put(&self, value: T) -> Result<()> {
        // counted before the hand-off so a taker never sees a value the count misses
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.tx.send(value).map_err(|_| {
            self.puts.fetch_sub(1, Ordering::SeqCst);
            BridgeError::MailboxClosed
        })
    }

    /// Remove the value, blocking until one is available.
    pub fn take(&self) -> Result<T> {
        self.rx.recv().map_err(|_| BridgeError::MailboxClosed)
    }

    /// Remove the value if one is waiting.
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of successful `put`s since creation.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// True if no value is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two mailboxes connecting a transport to an episode state machine.
#[derive(Debug, Clone, Default)]
pub struct Mailboxes {
    /// Engine -> bridge.
    pub state: Mailbox<StateMessage>,
    /// Bridge -> engine.
    pub action: Mailbox<ActionMessage>,
}

impl Mailboxes {
    /// Fresh pair of empty mailboxes.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn take_blocks_until_put() {
        let mailbox = Mailbox::<u32>::new();
        let other = mailbox.clone();
        let handle = thread::spawn(move || other.take().unwrap());

        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        mailbox.put(7).unwrap();
        assert_eq!(handle.join().unwrap(), 7);
        assert_eq!(mailbox.put_count(), 1);
    }

    #[test]
    fn second_put_waits_for_the_slot() {
        let mailbox = Mailbox::<u32>::new();
        mailbox.put(1).unwrap();

        let other = mailbox.clone();
        let handle = thread::spawn(move || other.put(2).unwrap());
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        assert_eq!(mailbox.take().unwrap(), 1);
        handle.join().unwrap();
        assert_eq!(mailbox.take().unwrap(), 2);
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.put_count(), 2);
    }

    #[test]
    fn try_take_does_not_block() {
        let mailbox = Mailbox::<u32>::new();
        assert_eq!(mailbox.try_take(), None);
        mailbox.put(3).unwrap();
        assert_eq!(mailbox.try_take(), Some(3));
    }
}
