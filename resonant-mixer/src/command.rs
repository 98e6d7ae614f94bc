//! Deferred delivery of state-transition callbacks. Grounded on
//! `audio-system::MixerQueue`: the mix tick never calls user code while
//! holding the mixer mutex, so transition events are pushed onto a
//! lock-free `ArrayQueue` during the tick and drained/dispatched right
//! after the mutex is released (spec §4.C step 5).

use crossbeam::queue::ArrayQueue;

use crate::layer::LayerIndex;

/// One play-state transition a layer fired this tick (spec: "Every
/// transition out of a playing state fires a callback... delivered to the
/// owning channel").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixEvent {
    Begin(LayerIndex),
    Pause(LayerIndex),
    Resume(LayerIndex),
    Loop(LayerIndex),
    End(LayerIndex),
    Stop(LayerIndex),
}

pub(crate) struct EventQueue {
    queue: ArrayQueue<MixEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self { queue: ArrayQueue::new(capacity) }
    }

    pub fn push(&self, event: MixEvent) {
        if self.queue.push(event).is_err() {
            tracing::warn!("mixer event queue full, dropping {event:?}");
        }
    }

    pub fn drain_into(&self, out: &mut Vec<MixEvent>) {
        while let Some(event) = self.queue.pop() {
            out.push(event);
        }
    }
}
