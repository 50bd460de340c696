//! Single-slot frame mailbox between the pipeline's delivery thread and the engine.
//!
//! The producer (whatever thread the backend delivers samples on) publishes an owned
//! frame into the slot; the consumer (`Player::update` on the control thread) takes it,
//! hands its bytes to the frame callback and drops it, which releases the backend's
//! mapping. The slot never holds more than one frame:
//! - if a frame is still pending, new frames are dropped on the spot
//! - publishing and taking are single atomic pointer operations, neither side blocks

use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

/// A decoded frame borrowed from the backend until dropped.
pub trait VideoFrame: Send + 'static {
    /// Raw pixel bytes in the negotiated format.
    fn data(&self) -> &[u8];

    /// Final negotiated width/height, when the frame's format is fixed.
    fn negotiated_size(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Atomic single-slot mailbox.
///
/// A non-null pointer is the "dirty" flag: it means a frame awaits the consumer.
pub struct FrameSlot<F> {
    pending: AtomicPtr<F>,
    dropped: AtomicU64,
    _owns: PhantomData<Box<F>>,
}

// Frames move between threads by ownership transfer only; no `&F` is ever shared.
unsafe impl<F: Send> Sync for FrameSlot<F> {}

impl<F> Default for FrameSlot<F> {
    fn default() -> Self {
        Self {
            pending: AtomicPtr::new(ptr::null_mut()),
            dropped: AtomicU64::new(0),
            _owns: PhantomData,
        }
    }
}

impl<F: Send> FrameSlot<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame is waiting for the consumer.
    pub fn is_dirty(&self) -> bool {
        !self.pending.load(Ordering::Acquire).is_null()
    }

    /// Hand a frame to the consumer.
    ///
    /// Returns `false` (and releases `frame`) when the previous frame has not been
    /// consumed yet.
    pub fn publish(&self, frame: F) -> bool {
        if self.is_dirty() {
            drop(frame);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let raw = Box::into_raw(Box::new(frame));
        match self.pending.compare_exchange(
            ptr::null_mut(),
            raw,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(_) => {
                // SAFETY: the exchange failed, so `raw` was never made visible to
                // another thread and is still exclusively ours.
                drop(unsafe { Box::from_raw(raw) });
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Take the pending frame, clearing the dirty flag.
    pub fn take(&self) -> Option<F> {
        let raw = self.pending.swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            return None;
        }
        // SAFETY: `raw` came from `Box::into_raw` in `publish`, and the swap made
        // this call its only owner.
        Some(*unsafe { Box::from_raw(raw) })
    }

    /// Release any pending frame without delivering it.
    pub fn clear(&self) {
        drop(self.take());
    }

    /// Frames discarded because the consumer had not caught up.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<F> Drop for FrameSlot<F> {
    fn drop(&mut self) {
        let raw = *self.pending.get_mut();
        if !raw.is_null() {
            // SAFETY: `&mut self` guarantees no producer or consumer is active.
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

/// Negotiated frame dimensions packed into one atomic word (0 = unknown).
#[derive(Debug, Default)]
pub struct NegotiatedSize(AtomicU64);

impl NegotiatedSize {
    pub fn set(&self, width: u32, height: u32) {
        let packed = ((width as u64) << 32) | height as u64;
        self.0.store(packed, Ordering::Release);
    }

    pub fn get(&self) -> Option<(u32, u32)> {
        let packed = self.0.load(Ordering::Acquire);
        if packed == 0 {
            return None;
        }
        Some(((packed >> 32) as u32, packed as u32))
    }
}

/// Producer-side handle given to the backend's delivery callbacks.
pub struct FrameSink<F> {
    slot: Arc<FrameSlot<F>>,
    negotiated: Arc<NegotiatedSize>,
}

impl<F> Clone for FrameSink<F> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            negotiated: self.negotiated.clone(),
        }
    }
}

impl<F: VideoFrame> FrameSink<F> {
    /// Create a sink backed by a fresh, empty slot.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(FrameSlot::new()),
            negotiated: Arc::new(NegotiatedSize::default()),
        }
    }

    /// Whether delivering now would be accepted; lets producers skip mapping.
    pub fn wants_frame(&self) -> bool {
        !self.slot.is_dirty()
    }

    /// Deliver the pre-roll frame, recording its negotiated dimensions.
    pub fn deliver_preroll(&self, frame: F) -> bool {
        match frame.negotiated_size() {
            Some((width, height)) if width > 0 && height > 0 => {
                tracing::debug!(width, height, "negotiated frame size");
                self.negotiated.set(width, height);
            }
            _ => tracing::warn!("pre-roll frame format is not fixed; keeping requested size"),
        }
        self.slot.publish(frame)
    }

    /// Deliver a regular sample.
    pub fn deliver_sample(&self, frame: F) -> bool {
        self.slot.publish(frame)
    }

    pub fn slot(&self) -> &FrameSlot<F> {
        &self.slot
    }

    pub fn negotiated_size(&self) -> Option<(u32, u32)> {
        self.negotiated.get()
    }
}

impl<F: VideoFrame> Default for FrameSink<F> {
    fn default() -> Self {
        Self::new()
    }
}
