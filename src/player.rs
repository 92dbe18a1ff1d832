//! Loop playback
//!
//! Replays a captured phrase on a dedicated blocking task, re-deriving the
//! original inter-event timing, looping until cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::recorder::RecordingBuffer;
use crate::sink::OutputSink;

/// Handle to a running playback session.
///
/// The controller retains it so a later transition can cancel the task
/// deterministically; playback is never detached. Each session owns a
/// fresh cancel flag, so a lagging task can never be revived by a newer
/// session reusing its flag.
pub struct PlaybackHandle {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PlaybackHandle {
    /// Signal cooperative cancellation. The task polls the flag every spin
    /// iteration and stops emitting within one iteration.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to finish. Shutdown path only: the
    /// input callback must never block on a join.
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!("playback task join failed: {}", e);
        }
    }
}

/// Spawn a playback session for `buffer` on a dedicated blocking task.
///
/// The buffer is moved into the task; a concurrently started new recording
/// allocates its own vector and cannot race this one.
pub fn spawn_playback(
    runtime: &Handle,
    buffer: RecordingBuffer,
    sink: Arc<dyn OutputSink>,
) -> PlaybackHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let task = runtime.spawn_blocking(move || play_loop(&buffer, sink.as_ref(), &flag));
    PlaybackHandle { cancel, task }
}

/// Replay the buffer indefinitely until `cancel` is set.
///
/// Timing is busy-wait against a monotonic clock, yielding the scheduler
/// each spin: the wait granularity stays far below one millisecond, which
/// bounds both jitter and cancellation latency. The reference instant is
/// reset at the top of every iteration, so timing error cannot accumulate
/// across repeats.
fn play_loop(buffer: &RecordingBuffer, sink: &dyn OutputSink, cancel: &AtomicBool) {
    let events = buffer.events();
    // a sentinel-only (or empty) buffer is a zero-length loop: nothing to do
    if events.len() < 2 {
        return;
    }
    let first = events[0].at_ms;
    let last = events[events.len() - 1].at_ms;

    debug!(
        "playback loop started: {} events, {}ms",
        events.len() - 1,
        last.saturating_sub(first)
    );

    while !cancel.load(Ordering::Relaxed) {
        let loop_start = Instant::now();

        for event in events {
            let target = Duration::from_millis(event.at_ms.saturating_sub(first));
            while loop_start.elapsed() < target {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                std::thread::yield_now();
            }

            if event.at_ms == last {
                // the sentinel only marks the loop duration, never replayed
                break;
            }

            if let Err(e) = sink.emit(event.raw) {
                warn!("playback send failed: {:#}", e);
            }
        }
    }
}
