//! Mock pulse source for testing and development.
//!
//! Stands in for a GPIO edge interrupt: every call to [`MockPulseSource::edge`]
//! is delivered to the [`EdgeSink`] exactly like a hardware edge would be,
//! including bounce bursts that the debounce filter is expected to swallow.

use crate::traits::EdgeSink;
use knocker_core::LineId;
use std::sync::Arc;
use std::time::Duration;

/// Simulated edge-triggered input line.
///
/// # Examples
///
/// ```
/// use knocker_core::LineId;
/// use knocker_hardware::mock::MockPulseSource;
/// use knocker_hardware::traits::EdgeSink;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
/// impl EdgeSink for Counter {
///     fn on_edge(&self, _line: LineId) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// let source = MockPulseSource::new(LineId::new(0), counter.clone());
/// source.edge();
/// assert_eq!(counter.0.load(Ordering::Relaxed), 1);
/// ```
#[derive(Clone)]
pub struct MockPulseSource {
    line: LineId,
    sink: Arc<dyn EdgeSink>,
}

impl std::fmt::Debug for MockPulseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPulseSource")
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl MockPulseSource {
    /// Create a source bound to `line`. Every edge carries this identifier.
    pub fn new(line: LineId, sink: Arc<dyn EdgeSink>) -> Self {
        Self { line, sink }
    }

    /// Line this source reports on.
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Deliver one raw edge immediately.
    pub fn edge(&self) {
        self.sink.on_edge(self.line);
    }

    /// Deliver a bouncing contact: `edges` raw edges `spacing` apart.
    pub async fn bounce(&self, edges: usize, spacing: Duration) {
        for i in 0..edges {
            if i > 0 {
                tokio::time::sleep(spacing).await;
            }
            self.edge();
        }
    }

    /// Deliver `count` clean pulses `gap` apart. The first pulse is immediate.
    pub async fn pulses(&self, count: u8, gap: Duration) {
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(gap).await;
            }
            self.edge();
        }
    }

    /// Knock a whole code: each digit is a burst of pulses `pulse_gap` apart,
    /// bursts are separated by `digit_gap`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use knocker_hardware::mock::MockPulseSource;
    /// # use std::time::Duration;
    /// # async fn example(source: MockPulseSource) {
    /// // 2 knocks, pause, 2 knocks, pause, 3 knocks
    /// source
    ///     .knock(&[2, 2, 3], Duration::from_millis(150), Duration::from_millis(1000))
    ///     .await;
    /// # }
    /// ```
    pub async fn knock(&self, digits: &[u8], pulse_gap: Duration, digit_gap: Duration) {
        for (i, &digit) in digits.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(digit_gap).await;
            }
            self.pulses(digit, pulse_gap).await;
        }
    }
}
