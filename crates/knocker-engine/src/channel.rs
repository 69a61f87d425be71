//! Bounded lock-free pulse channel.
//!
//! One channel per input line. Producers run in the edge callback and must
//! never block or allocate; the single consumer is the line's recognizer task.
//!
//! # Architecture
//!
//! ```text
//! EdgeDispatcher ──try_send──▶ [ ring of N slots ] ──recv / recv_timeout──▶ recognizer
//!   (many, Clone)               seq-numbered cells        (one, owns the receiver)
//! ```
//!
//! The ring is the classic bounded queue with a sequence number per slot:
//! a producer claims position `p` when `slot.seq == p`, publishes by storing
//! `p + 1`; the consumer takes position `p` when `slot.seq == p + 1` and hands
//! the slot back to producers by storing `p + N`. Storage is allocated once in
//! [`pulse_channel`]. A [`Notify`] wakes the consumer after every publish.

use knocker_core::PulseEvent;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// Error returned by [`PulseSender::try_send`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendError {
    /// The channel holds `capacity` events already. The event was dropped.
    #[error("Pulse channel full")]
    Full,

    /// The receiver is gone.
    #[error("Pulse channel closed")]
    Closed,
}

/// Error returned by [`PulseReceiver::recv`] and [`PulseReceiver::recv_timeout`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// Nothing arrived before the timeout.
    #[error("No pulse before timeout")]
    Timeout,

    /// Every sender is gone and the queue is drained.
    #[error("Pulse channel closed")]
    Closed,
}

struct Slot {
    seq: AtomicUsize,
    event: UnsafeCell<PulseEvent>,
}

struct Shared {
    slots: Box<[Slot]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    notify: Notify,
    senders: AtomicUsize,
    receiver_alive: AtomicBool,
    dropped: AtomicU64,
}

// SAFETY: a slot's cell is written only by the producer that won the CAS on
// `tail` for that position, and read only by the consumer that won the CAS on
// `head`. The per-slot sequence number (Release store / Acquire load) orders
// the write before the read and the read before the next write.
unsafe impl Sync for Shared {}
unsafe impl Send for Shared {}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&self, event: PulseEvent) -> bool {
        let capacity = self.capacity();
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % capacity];
            let seq = slot.seq.load(Ordering::Acquire);

            if seq == pos {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: position `pos` is exclusively ours until we publish it.
                        unsafe { *slot.event.get() = event };
                        slot.seq.store(pos + 1, Ordering::Release);
                        return true;
                    }
                    Err(current) => pos = current,
                }
            } else if seq < pos {
                // Slot still holds an event from the previous lap: full.
                return false;
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    fn pop(&self) -> Option<PulseEvent> {
        let capacity = self.capacity();
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % capacity];
            let seq = slot.seq.load(Ordering::Acquire);

            if seq == pos + 1 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the producer published this slot and nobody
                        // else can claim position `pos` now.
                        let event = unsafe { *slot.event.get() };
                        slot.seq.store(pos + capacity, Ordering::Release);
                        return Some(event);
                    }
                    Err(current) => pos = current,
                }
            } else if seq < pos + 1 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.saturating_sub(head).min(self.capacity())
    }
}

/// Create a bounded pulse channel holding at most `capacity` events.
///
/// A `capacity` of zero is raised to one.
///
/// # Examples
///
/// ```
/// use knocker_core::{LineId, PulseEvent};
/// use knocker_engine::channel::{pulse_channel, TrySendError};
///
/// let (tx, rx) = pulse_channel(1);
/// let event = PulseEvent::new(LineId::new(0), 10);
///
/// assert!(tx.try_send(event).is_ok());
/// assert_eq!(tx.try_send(event), Err(TrySendError::Full));
/// assert_eq!(rx.len(), 1);
/// assert_eq!(rx.dropped(), 1);
/// ```
pub fn pulse_channel(capacity: usize) -> (PulseSender, PulseReceiver) {
    let capacity = capacity.max(1);
    let slots = (0..capacity)
        .map(|i| Slot {
            seq: AtomicUsize::new(i),
            event: UnsafeCell::new(PulseEvent::default()),
        })
        .collect();

    let shared = Arc::new(Shared {
        slots,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        notify: Notify::new(),
        senders: AtomicUsize::new(1),
        receiver_alive: AtomicBool::new(true),
        dropped: AtomicU64::new(0),
    });

    (
        PulseSender {
            shared: Arc::clone(&shared),
        },
        PulseReceiver { shared },
    )
}

/// Producer half. Cheap to clone; dropping the last clone closes the channel.
pub struct PulseSender {
    shared: Arc<Shared>,
}

impl PulseSender {
    /// Enqueue `event` without blocking.
    ///
    /// # Errors
    /// `Full` when the ring is at capacity (the event is counted as dropped),
    /// `Closed` when the receiver has been dropped.
    pub fn try_send(&self, event: PulseEvent) -> Result<(), TrySendError> {
        if !self.shared.receiver_alive.load(Ordering::Acquire) {
            return Err(TrySendError::Closed);
        }
        if self.shared.push(event) {
            self.shared.notify.notify_one();
            Ok(())
        } else {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            Err(TrySendError::Full)
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Events rejected because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.receiver_alive.load(Ordering::Acquire)
    }
}

impl Clone for PulseSender {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for PulseSender {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.notify.notify_one();
        }
    }
}

impl std::fmt::Debug for PulseSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseSender")
            .field("capacity", &self.capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Consumer half. Owned by exactly one task.
pub struct PulseReceiver {
    shared: Arc<Shared>,
}

impl PulseReceiver {
    /// Wait for the next pulse with no time limit.
    ///
    /// # Errors
    /// `RecvError::Closed` once every sender is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Result<PulseEvent, RecvError> {
        self.receive(None).await
    }

    /// Wait at most `timeout` for the next pulse.
    ///
    /// # Errors
    /// `RecvError::Timeout` on silence, `RecvError::Closed` as for [`recv`](Self::recv).
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<PulseEvent, RecvError> {
        self.receive(Some(timeout)).await
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> Result<PulseEvent, RecvError> {
        match timeout {
            None => self.wait().await,
            Some(timeout) => tokio::time::timeout(timeout, self.wait())
                .await
                .unwrap_or(Err(RecvError::Timeout)),
        }
    }

    async fn wait(&mut self) -> Result<PulseEvent, RecvError> {
        loop {
            if let Some(event) = self.shared.pop() {
                return Ok(event);
            }
            if self.shared.senders.load(Ordering::Acquire) == 0 {
                // A sender may have published right before dropping.
                return self.shared.pop().ok_or(RecvError::Closed);
            }
            // notify_one stores a permit when nobody waits, so a publish
            // between pop() and here is not lost.
            self.shared.notify.notified().await;
        }
    }

    /// Take the next queued pulse without waiting.
    pub fn try_recv(&mut self) -> Option<PulseEvent> {
        self.shared.pop()
    }

    /// Discard every queued event. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let mut discarded = 0;
        while self.shared.pop().is_some() {
            discarded += 1;
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Events rejected because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for PulseReceiver {
    fn drop(&mut self) {
        self.shared.receiver_alive.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for PulseReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseReceiver")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knocker_core::LineId;

    fn event(tick_ms: u64) -> PulseEvent {
        PulseEvent::new(LineId::new(5), tick_ms)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = pulse_channel(4);

        for tick in [10, 20, 30] {
            tx.try_send(event(tick)).unwrap();
        }

        for tick in [10, 20, 30] {
            assert_eq!(rx.recv().await.unwrap().tick_ms, tick);
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = pulse_channel(10);

        for tick in 0..10 {
            tx.try_send(event(tick)).unwrap();
        }
        assert_eq!(tx.try_send(event(99)), Err(TrySendError::Full));
        assert_eq!(rx.len(), 10);
        assert_eq!(tx.dropped(), 1);
    }

    #[tokio::test]
    async fn test_ring_wraps_around() {
        let (tx, mut rx) = pulse_channel(3);

        // Several laps with a capacity that is not a power of two.
        for tick in 0..20 {
            tx.try_send(event(tick)).unwrap();
            assert_eq!(rx.recv().await.unwrap().tick_ms, tick);
        }
        assert_eq!(tx.dropped(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_on_silence() {
        let (_tx, mut rx) = pulse_channel(10);

        let started = tokio::time::Instant::now();
        let result = rx.recv_timeout(Duration::from_millis(800)).await;

        assert_eq!(result, Err(RecvError::Timeout));
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_wakes_on_send() {
        let (tx, mut rx) = pulse_channel(10);

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            tx.try_send(event(300)).unwrap();
            tx
        });

        let received = rx.recv_timeout(Duration::from_millis(800)).await.unwrap();
        assert_eq!(received.tick_ms, 300);
        drop(producer.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_after_last_sender_dropped() {
        let (tx, mut rx) = pulse_channel(10);
        let tx2 = tx.clone();

        tx.try_send(event(1)).unwrap();
        drop(tx);
        drop(tx2);

        // Queued events are still delivered before Closed.
        assert_eq!(rx.recv().await.unwrap().tick_ms, 1);
        assert_eq!(rx.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test]
    async fn test_pending_recv_sees_close() {
        let (tx, mut rx) = pulse_channel(10);

        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        drop(tx);

        assert_eq!(waiter.await.unwrap(), Err(RecvError::Closed));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = pulse_channel(10);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.try_send(event(1)), Err(TrySendError::Closed));
    }

    #[test]
    fn test_clear_discards_queued() {
        let (tx, mut rx) = pulse_channel(10);
        for tick in 0..4 {
            tx.try_send(event(tick)).unwrap();
        }

        assert_eq!(rx.clear(), 4);
        assert!(rx.is_empty());
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (tx, _rx) = pulse_channel(0);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn test_concurrent_producers() {
        let (tx, mut rx) = pulse_channel(64);

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for i in 0..16 {
                        tx.try_send(event(n * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut received = Vec::new();
        while let Some(event) = rx.try_recv() {
            received.push(event.tick_ms);
        }
        assert_eq!(received.len(), 64);

        // Per-producer order is preserved.
        for n in 0..4 {
            let from_producer: Vec<_> = received
                .iter()
                .copied()
                .filter(|tick| tick / 100 == n)
                .collect();
            assert_eq!(from_producer, (0..16).map(|i| n * 100 + i).collect::<Vec<_>>());
        }
    }
}
