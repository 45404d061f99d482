//! Reference buffer queue.
//!
//! A fixed pool of [`NUM_BUFFER_SLOTS`] slots shared by one producer and one
//! consumer. The producer side is the [`SurfaceTexture`] impl; the consumer
//! side is [`BufferQueue::acquire_buffer`] and
//! [`BufferQueue::release_with_fence`].
//!
//! Buffer count rules:
//! ```text
//! min_undequeued   = max_acquired      (synchronous)
//!                  = max_acquired + 1  (asynchronous)
//! min_buffer_count = min_undequeued + 1
//! buffer_count     = override, or max(default_buffer_count, min_buffer_count)
//! ```
//!
//! Once a buffer has been queued since the last connect or count change,
//! the producer may not hold so many slots that fewer than
//! `min_undequeued` remain with the queue and consumer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::allocator::{BufferAllocator, SyntheticAllocator};
use super::config::QueueConfig;
use super::slot::{AcquiredBuffer, BufferSlot, BufferState};
use crate::codec::{QueueBufferInput, QueueBufferOutput};
use crate::error::{Result, SurfaceError};
use crate::handle::{Fence, GraphicBuffer};
use crate::protocol::Capabilities;
use crate::status::Status;
use crate::surface::SurfaceTexture;
use crate::types::{Api, DequeueFlags, DequeueOutput, QueryKey, Rect};

/// Capacity of the slot pool.
pub const NUM_BUFFER_SLOTS: usize = 32;

fn reject(status: Status) -> SurfaceError {
    SurfaceError::remote(status)
}

/// Validate a slot index against the pool capacity.
fn slot_index(slot: i32, op: &str) -> Result<usize> {
    match usize::try_from(slot) {
        Ok(index) if index < NUM_BUFFER_SLOTS => Ok(index),
        _ => {
            warn!("{}: slot {} out of range [0, {})", op, slot, NUM_BUFFER_SLOTS);
            Err(reject(Status::BAD_VALUE))
        }
    }
}

struct Core {
    slots: Vec<BufferSlot>,
    /// Queued slots, oldest first.
    queue: VecDeque<usize>,
    connected_api: Option<Api>,
    abandoned: bool,
    synchronous: bool,
    /// Producer-set buffer count.
    override_count: Option<usize>,
    /// The pool was reset; report it on the next dequeue.
    release_all_pending: bool,
    buffer_has_been_queued: bool,
    frame_counter: u64,
    /// Slot latched by `update_and_get_current`.
    current: Option<usize>,
    default_width: u32,
    default_height: u32,
    default_format: u32,
    default_buffer_count: usize,
    max_acquired: usize,
    transform_hint: u32,
    consumer_usage: u32,
}

impl Core {
    fn new(config: &QueueConfig) -> Self {
        Self {
            slots: vec![BufferSlot::default(); NUM_BUFFER_SLOTS],
            queue: VecDeque::new(),
            connected_api: None,
            abandoned: false,
            synchronous: config.synchronous,
            override_count: None,
            release_all_pending: false,
            buffer_has_been_queued: false,
            frame_counter: 0,
            current: None,
            default_width: config.default_width,
            default_height: config.default_height,
            default_format: config.default_format,
            default_buffer_count: config.default_buffer_count,
            max_acquired: config.max_acquired.max(1),
            transform_hint: config.transform_hint,
            consumer_usage: config.consumer_usage,
        }
    }

    fn min_undequeued(&self) -> usize {
        if self.synchronous {
            self.max_acquired
        } else {
            self.max_acquired + 1
        }
    }

    fn min_buffer_count(&self) -> usize {
        self.min_undequeued() + 1
    }

    fn buffer_count(&self) -> usize {
        self.override_count
            .unwrap_or_else(|| self.default_buffer_count.max(self.min_buffer_count()))
            .min(NUM_BUFFER_SLOTS)
    }

    fn count_in(&self, state: BufferState) -> usize {
        self.slots.iter().filter(|s| s.state == state).count()
    }

    /// Free slot that was queued longest ago.
    fn pick_free_slot(&self) -> Option<usize> {
        self.slots[..self.buffer_count()]
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == BufferState::Free)
            .min_by_key(|(_, s)| s.frame_number)
            .map(|(index, _)| index)
    }

    fn free_all(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
        self.queue.clear();
        self.current = None;
    }

    fn output(&self) -> QueueBufferOutput {
        QueueBufferOutput::new(
            self.default_width,
            self.default_height,
            self.transform_hint,
            self.queue.len() as u32,
        )
    }

    fn ensure_alive(&self, op: &str) -> Result<()> {
        if self.abandoned {
            warn!("{}: queue has been abandoned", op);
            return Err(reject(Status::NO_INIT));
        }
        Ok(())
    }

    fn release(&mut self, index: usize, fence: Fence) -> Result<()> {
        let slot = &mut self.slots[index];
        if slot.state != BufferState::Acquired {
            warn!("releaseBuffer: slot {} is {} (not ACQUIRED)", index, slot.state);
            return Err(reject(Status::BAD_VALUE));
        }
        slot.state = BufferState::Free;
        slot.fence = fence;
        if self.current == Some(index) {
            self.current = None;
        }
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<AcquiredBuffer>> {
        if self.count_in(BufferState::Acquired) >= self.max_acquired {
            warn!("acquireBuffer: already holding {} buffers", self.max_acquired);
            return Err(reject(Status::INVALID_OPERATION));
        }
        let index = match self.queue.pop_front() {
            Some(index) => index,
            None => return Ok(None),
        };
        let slot = &mut self.slots[index];
        let buffer = match slot.buffer.clone() {
            Some(buffer) => buffer,
            None => return Err(reject(Status::BAD_VALUE)),
        };
        slot.state = BufferState::Acquired;
        Ok(Some(AcquiredBuffer {
            slot: index as i32,
            buffer,
            fence: slot.fence.take(),
            frame_number: slot.frame_number,
            timestamp: slot.timestamp,
            crop: slot.crop,
            transform: slot.transform,
            scaling_mode: slot.scaling_mode,
        }))
    }
}

/// Slot-pool implementation of [`SurfaceTexture`].
pub struct BufferQueue {
    name: String,
    capabilities: Capabilities,
    core: Mutex<Core>,
    dequeue_cond: Condvar,
    allocator: Arc<dyn BufferAllocator>,
    dequeue_timeout: Option<Duration>,
}

impl BufferQueue {
    pub fn builder() -> BufferQueueBuilder {
        BufferQueueBuilder::new()
    }

    /// Queue with the given configuration and a synthetic allocator.
    pub fn from_config(config: QueueConfig) -> Self {
        BufferQueueBuilder::from_config(config).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opcode set this queue should be served with.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Current pool size.
    pub fn buffer_count(&self) -> usize {
        self.core.lock().buffer_count()
    }

    pub fn connected_api(&self) -> Option<Api> {
        self.core.lock().connected_api
    }

    pub fn is_synchronous(&self) -> bool {
        self.core.lock().synchronous
    }

    pub fn is_abandoned(&self) -> bool {
        self.core.lock().abandoned
    }

    /// Number of buffers waiting for the consumer.
    pub fn queued_count(&self) -> usize {
        self.core.lock().queue.len()
    }

    /// State of a slot, `None` if the index is out of range.
    pub fn slot_state(&self, slot: i32) -> Option<BufferState> {
        let index = usize::try_from(slot).ok()?;
        self.core.lock().slots.get(index).map(|s| s.state)
    }

    /// Size used for dequeues that pass zero width and height.
    pub fn set_default_size(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(reject(Status::BAD_VALUE));
        }
        let mut core = self.core.lock();
        core.default_width = width;
        core.default_height = height;
        Ok(())
    }

    pub fn set_transform_hint(&self, hint: u32) {
        self.core.lock().transform_hint = hint;
    }

    /// Take the oldest queued buffer. `Ok(None)` if nothing is queued.
    pub fn acquire_buffer(&self) -> Result<Option<AcquiredBuffer>> {
        let mut core = self.core.lock();
        core.ensure_alive("acquireBuffer")?;
        let acquired = core.acquire()?;
        if let Some(acquired) = &acquired {
            debug!(
                "{}: acquired slot {} frame {}",
                self.name, acquired.slot, acquired.frame_number
            );
        }
        Ok(acquired)
    }

    /// Give an acquired slot back with the consumer's fence.
    pub fn release_with_fence(&self, slot: i32, fence: Fence) -> Result<()> {
        let index = slot_index(slot, "releaseBuffer")?;
        let mut core = self.core.lock();
        core.ensure_alive("releaseBuffer")?;
        core.release(index, fence)?;
        self.dequeue_cond.notify_all();
        Ok(())
    }

    /// Tear the queue down. Every later call fails with `NO_INIT` except
    /// disconnect.
    pub fn abandon(&self) {
        let mut core = self.core.lock();
        core.abandoned = true;
        core.free_all();
        self.dequeue_cond.notify_all();
        debug!("{}: abandoned", self.name);
    }
}

impl SurfaceTexture for BufferQueue {
    fn request_buffer(&self, slot: i32) -> Result<Option<GraphicBuffer>> {
        let index = slot_index(slot, "requestBuffer")?;
        let mut core = self.core.lock();
        core.ensure_alive("requestBuffer")?;

        let entry = &mut core.slots[index];
        match &entry.buffer {
            None => Ok(None),
            Some(buffer) if entry.state == BufferState::Dequeued => {
                let buffer = buffer.clone();
                entry.request_buffer_called = true;
                Ok(Some(buffer))
            }
            Some(_) => {
                warn!("requestBuffer: slot {} is {} (not DEQUEUED)", slot, entry.state);
                Err(reject(Status::BAD_VALUE))
            }
        }
    }

    fn set_buffer_count(&self, count: i32) -> Result<()> {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        core.ensure_alive("setBufferCount")?;

        let requested = match usize::try_from(count) {
            Ok(n) if n <= NUM_BUFFER_SLOTS => n,
            _ => {
                warn!("setBufferCount: {} out of range [0, {}]", count, NUM_BUFFER_SLOTS);
                return Err(reject(Status::BAD_VALUE));
            }
        };

        if core.count_in(BufferState::Dequeued) > 0 {
            warn!("setBufferCount: producer still holds dequeued buffers");
            return Err(reject(Status::BUSY));
        }

        if requested == 0 {
            core.override_count = None;
            self.dequeue_cond.notify_all();
            return Ok(());
        }

        let min = core.min_buffer_count();
        if requested < min {
            warn!("setBufferCount: {} is below the minimum {}", requested, min);
            return Err(reject(Status::BAD_VALUE));
        }

        core.free_all();
        core.override_count = Some(requested);
        core.release_all_pending = true;
        core.buffer_has_been_queued = false;
        self.dequeue_cond.notify_all();
        debug!("{}: buffer count set to {}", self.name, requested);
        Ok(())
    }

    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: u32,
        usage: u32,
    ) -> Result<DequeueOutput> {
        if (width == 0) != (height == 0) {
            warn!("dequeueBuffer: invalid size {}x{}", width, height);
            return Err(reject(Status::BAD_VALUE));
        }

        let deadline = self.dequeue_timeout.map(|t| Instant::now() + t);
        let mut guard = self.core.lock();

        let index = loop {
            guard.ensure_alive("dequeueBuffer")?;
            if guard.connected_api.is_none() {
                warn!("dequeueBuffer: no producer connected");
                return Err(reject(Status::NO_INIT));
            }

            if guard.buffer_has_been_queued {
                let held = guard.count_in(BufferState::Dequeued) + 1;
                let remaining = guard.buffer_count().saturating_sub(held);
                if remaining < guard.min_undequeued() {
                    warn!(
                        "dequeueBuffer: too many dequeued buffers ({} of {})",
                        held - 1,
                        guard.buffer_count()
                    );
                    return Err(reject(Status::BUSY));
                }
            }

            if let Some(index) = guard.pick_free_slot() {
                break index;
            }

            match deadline {
                Some(deadline) => {
                    let timed_out = self.dequeue_cond.wait_until(&mut guard, deadline).timed_out();
                    if timed_out && guard.pick_free_slot().is_none() {
                        return Err(reject(Status::WOULD_BLOCK));
                    }
                }
                None => self.dequeue_cond.wait(&mut guard),
            }
        };

        let core = &mut *guard;
        let (width, height) = if width == 0 {
            (core.default_width, core.default_height)
        } else {
            (width, height)
        };
        let format = if format == 0 { core.default_format } else { format };
        let usage = usage | core.consumer_usage;

        let mut flags = DequeueFlags::NONE;
        if core.release_all_pending {
            flags.insert(DequeueFlags::RELEASE_ALL_BUFFERS);
        }

        let stale = core.slots[index]
            .buffer
            .as_ref()
            .map_or(true, |b| b.needs_reallocation(width, height, format, usage));
        if stale {
            let buffer = self.allocator.allocate(width, height, format, usage)?;
            let slot = &mut core.slots[index];
            slot.buffer = Some(buffer);
            slot.fence = Fence::no_fence();
            slot.request_buffer_called = false;
            flags.insert(DequeueFlags::BUFFER_NEEDS_REALLOCATION);
        }

        core.release_all_pending = false;
        let slot = &mut core.slots[index];
        slot.state = BufferState::Dequeued;
        let fence = slot.fence.take();

        debug!("{}: dequeued slot {} flags {:#x}", self.name, index, flags.bits());
        Ok(DequeueOutput {
            slot: index as i32,
            fence,
            flags,
        })
    }

    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput> {
        let index = slot_index(slot, "queueBuffer")?;
        let mut guard = self.core.lock();
        let core = &mut *guard;
        core.ensure_alive("queueBuffer")?;

        let entry = &core.slots[index];
        if entry.state != BufferState::Dequeued {
            warn!("queueBuffer: slot {} is {} (not DEQUEUED)", slot, entry.state);
            return Err(reject(Status::BAD_VALUE));
        }
        if !entry.request_buffer_called {
            warn!("queueBuffer: slot {} was queued without requesting its buffer", slot);
            return Err(reject(Status::BAD_VALUE));
        }
        if !input.transform.is_valid() {
            warn!("queueBuffer: invalid transform {:#x}", input.transform.bits());
            return Err(reject(Status::BAD_VALUE));
        }
        let bounds = entry
            .buffer
            .as_ref()
            .map(|b| Rect::from_size(b.width as i32, b.height as i32))
            .unwrap_or_default();
        if !input.crop.is_empty() && !bounds.contains(&input.crop) {
            warn!("queueBuffer: crop {:?} outside buffer {:?}", input.crop, bounds);
            return Err(reject(Status::BAD_VALUE));
        }

        core.frame_counter += 1;
        let frame_number = core.frame_counter;

        if core.synchronous || core.queue.is_empty() {
            core.queue.push_back(index);
        } else if let Some(front) = core.queue.front_mut() {
            // Asynchronous mode keeps only the newest frame.
            let dropped = std::mem::replace(front, index);
            core.slots[dropped].state = BufferState::Free;
        }

        let entry = &mut core.slots[index];
        entry.state = BufferState::Queued;
        entry.frame_number = frame_number;
        entry.timestamp = input.timestamp;
        entry.crop = input.crop;
        entry.transform = input.transform;
        entry.scaling_mode = input.scaling_mode;
        entry.fence = input.fence;

        core.buffer_has_been_queued = true;
        self.dequeue_cond.notify_all();

        debug!("{}: queued slot {} frame {}", self.name, index, frame_number);
        Ok(core.output())
    }

    fn cancel_buffer(&self, slot: i32, fence: Fence) -> Result<()> {
        let index = slot_index(slot, "cancelBuffer")?;
        let mut core = self.core.lock();
        core.ensure_alive("cancelBuffer")?;

        let entry = &mut core.slots[index];
        if entry.state != BufferState::Dequeued {
            warn!("cancelBuffer: slot {} is {} (not DEQUEUED)", slot, entry.state);
            return Err(reject(Status::BAD_VALUE));
        }
        entry.state = BufferState::Free;
        entry.fence = fence;
        self.dequeue_cond.notify_all();
        Ok(())
    }

    fn query(&self, what: QueryKey) -> Result<i32> {
        let core = self.core.lock();
        core.ensure_alive("query")?;

        let value = match what {
            QueryKey::Width | QueryKey::DefaultWidth => core.default_width as i32,
            QueryKey::Height | QueryKey::DefaultHeight => core.default_height as i32,
            QueryKey::Format => core.default_format as i32,
            QueryKey::MinUndequeuedBuffers => core.min_undequeued() as i32,
            QueryKey::TransformHint => core.transform_hint as i32,
            QueryKey::ConsumerRunningBehind => i32::from(core.queue.len() >= 2),
            QueryKey::ConsumerUsageBits => core.consumer_usage as i32,
        };
        Ok(value)
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<()> {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        core.ensure_alive("setSynchronousMode")?;

        if core.synchronous == enabled {
            return Ok(());
        }
        if !enabled {
            // Only the newest frame survives the switch.
            while core.queue.len() > 1 {
                if let Some(stale) = core.queue.pop_front() {
                    core.slots[stale].state = BufferState::Free;
                }
            }
        }
        core.synchronous = enabled;
        self.dequeue_cond.notify_all();
        debug!("{}: synchronous mode {}", self.name, enabled);
        Ok(())
    }

    fn connect(&self, api: Api) -> Result<QueueBufferOutput> {
        let mut core = self.core.lock();
        core.ensure_alive("connect")?;

        if let Some(current) = core.connected_api {
            warn!("connect: already connected (requested {}, current {})", api, current);
            return Err(reject(Status::BAD_VALUE));
        }
        core.connected_api = Some(api);
        core.buffer_has_been_queued = false;
        debug!("{}: connected {}", self.name, api);
        Ok(core.output())
    }

    fn disconnect(&self, api: Api) -> Result<()> {
        let mut core = self.core.lock();
        if core.abandoned {
            return Ok(());
        }
        if core.connected_api != Some(api) {
            warn!(
                "disconnect: {} is not the connected api ({:?})",
                api, core.connected_api
            );
            return Err(reject(Status::BAD_VALUE));
        }
        core.free_all();
        core.connected_api = None;
        core.buffer_has_been_queued = false;
        self.dequeue_cond.notify_all();
        debug!("{}: disconnected {}", self.name, api);
        Ok(())
    }

    fn update_and_get_current(&self) -> Result<Option<(i32, GraphicBuffer)>> {
        let mut core = self.core.lock();
        core.ensure_alive("updateAndGetCurrent")?;

        if !core.queue.is_empty() {
            // The latched slot is released first, so it does not count.
            let held = core
                .count_in(BufferState::Acquired)
                .saturating_sub(usize::from(core.current.is_some()));
            if held >= core.max_acquired {
                warn!("updateAndGetCurrent: already holding {} buffers", held);
                return Err(reject(Status::INVALID_OPERATION));
            }
            if let Some(previous) = core.current {
                core.release(previous, Fence::no_fence())?;
            }
            if let Some(acquired) = core.acquire()? {
                core.current = usize::try_from(acquired.slot).ok();
            }
            self.dequeue_cond.notify_all();
        }

        Ok(core.current.and_then(|index| {
            core.slots[index]
                .buffer
                .clone()
                .map(|buffer| (index as i32, buffer))
        }))
    }

    fn add_buffer_slot(&self, buffer: GraphicBuffer) -> Result<i32> {
        let mut core = self.core.lock();
        core.ensure_alive("addBufferSlot")?;

        let count = core.buffer_count();
        let index = core.slots[..count]
            .iter()
            .position(|s| s.buffer.is_none() && s.state == BufferState::Free);
        let index = match index {
            Some(index) => index,
            None => {
                warn!("addBufferSlot: no empty slot among {}", count);
                return Err(reject(Status::NO_MEMORY));
            }
        };

        let slot = &mut core.slots[index];
        slot.buffer = Some(buffer);
        slot.request_buffer_called = false;
        self.dequeue_cond.notify_all();
        Ok(index as i32)
    }

    fn get_id(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    fn release_buffer(&self, slot: i32) -> Result<()> {
        self.release_with_fence(slot, Fence::no_fence())
    }
}

/// Fluent configuration for a [`BufferQueue`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use surfacewire::queue::BufferQueue;
///
/// let queue = BufferQueue::builder()
///     .name("preview")
///     .default_size(1280, 720)
///     .synchronous(true)
///     .dequeue_timeout(Duration::from_millis(100))
///     .build();
///
/// assert_eq!(queue.name(), "preview");
/// assert_eq!(queue.buffer_count(), 2);
/// ```
pub struct BufferQueueBuilder {
    config: QueueConfig,
    allocator: Option<Arc<dyn BufferAllocator>>,
}

impl BufferQueueBuilder {
    pub fn new() -> Self {
        Self::from_config(QueueConfig::default())
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: QueueConfig) -> Self {
        Self {
            config,
            allocator: None,
        }
    }

    /// Identifier answered by `get_id`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Size used for dequeues that pass zero width and height.
    ///
    /// Default: 1x1
    pub fn default_size(mut self, width: u32, height: u32) -> Self {
        self.config.default_width = width;
        self.config.default_height = height;
        self
    }

    pub fn default_format(mut self, format: u32) -> Self {
        self.config.default_format = format;
        self
    }

    /// Pool size while the producer has not set one.
    ///
    /// Default: 2 (raised to the mode's minimum)
    pub fn default_buffer_count(mut self, count: usize) -> Self {
        self.config.default_buffer_count = count;
        self
    }

    /// Default: 1
    pub fn max_acquired(mut self, count: usize) -> Self {
        self.config.max_acquired = count;
        self
    }

    pub fn synchronous(mut self, enabled: bool) -> Self {
        self.config.synchronous = enabled;
        self
    }

    /// Bound a blocking dequeue; expiry fails with `WOULD_BLOCK`.
    ///
    /// Default: wait indefinitely
    pub fn dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.config.dequeue_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn transform_hint(mut self, hint: u32) -> Self {
        self.config.transform_hint = hint;
        self
    }

    /// Usage bits added to every allocation.
    pub fn consumer_usage(mut self, usage: u32) -> Self {
        self.config.consumer_usage = usage;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Replace the synthetic allocator.
    pub fn allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn build(self) -> BufferQueue {
        let allocator = self
            .allocator
            .unwrap_or_else(|| Arc::new(SyntheticAllocator::new()));

        BufferQueue {
            name: self.config.name.clone(),
            capabilities: self.config.capabilities,
            core: Mutex::new(Core::new(&self.config)),
            dequeue_cond: Condvar::new(),
            allocator,
            dequeue_timeout: self.config.dequeue_timeout(),
        }
    }
}

impl Default for BufferQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{format, usage, Descriptor};
    use crate::types::{ScalingMode, Transform};
    use std::thread;

    fn connected(builder: BufferQueueBuilder) -> BufferQueue {
        let queue = builder.default_size(64, 64).build();
        queue.connect(Api::Cpu).unwrap();
        queue
    }

    fn frame(timestamp: i64) -> QueueBufferInput {
        QueueBufferInput::new(
            timestamp,
            Rect::from_size(64, 64),
            ScalingMode::Freeze,
            Transform::IDENTITY,
            Fence::no_fence(),
        )
    }

    /// Dequeue, request and return the slot.
    fn produce(queue: &BufferQueue) -> i32 {
        let out = queue.dequeue_buffer(64, 64, format::RGBA_8888, usage::SW_WRITE_OFTEN).unwrap();
        queue.request_buffer(out.slot).unwrap();
        out.slot
    }

    fn status_of(err: SurfaceError) -> Status {
        err.status()
    }

    #[test]
    fn test_default_buffer_counts() {
        let queue = BufferQueue::builder().build();
        assert_eq!(queue.buffer_count(), 3);
        assert_eq!(queue.query(QueryKey::MinUndequeuedBuffers).unwrap(), 2);

        let queue = BufferQueue::builder().synchronous(true).build();
        assert_eq!(queue.buffer_count(), 2);
        assert_eq!(queue.query(QueryKey::MinUndequeuedBuffers).unwrap(), 1);
    }

    #[test]
    fn test_first_dequeue_allocates() {
        let queue = connected(BufferQueue::builder());
        let out = queue.dequeue_buffer(64, 64, format::RGBA_8888, 0).unwrap();

        assert!(out.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
        assert!(!out.fence.is_valid());
        assert_eq!(queue.slot_state(out.slot), Some(BufferState::Dequeued));

        let buffer = queue.request_buffer(out.slot).unwrap().unwrap();
        assert_eq!((buffer.width, buffer.height), (64, 64));
        assert!(buffer.memory.is_some());
    }

    #[test]
    fn test_dequeue_requires_connection() {
        let queue = BufferQueue::builder().build();
        let err = queue.dequeue_buffer(64, 64, 0, 0).unwrap_err();
        assert_eq!(status_of(err), Status::NO_INIT);
    }

    #[test]
    fn test_dequeue_rejects_half_size() {
        let queue = connected(BufferQueue::builder());
        let err = queue.dequeue_buffer(64, 0, 0, 0).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
    }

    #[test]
    fn test_zero_size_uses_defaults() {
        let queue = connected(BufferQueue::builder().default_format(format::RGB_565));
        let out = queue.dequeue_buffer(0, 0, 0, 0).unwrap();
        let buffer = queue.request_buffer(out.slot).unwrap().unwrap();
        assert_eq!((buffer.width, buffer.height), (64, 64));
        assert_eq!(buffer.format, format::RGB_565);
    }

    #[test]
    fn test_reused_buffer_is_not_reallocated() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.cancel_buffer(slot, Fence::no_fence()).unwrap();

        let again = queue.dequeue_buffer(64, 64, format::RGBA_8888, usage::SW_WRITE_OFTEN).unwrap();
        assert_eq!(again.slot, slot);
        assert!(!again.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
    }

    #[test]
    fn test_cancel_fence_returned_on_next_dequeue() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.cancel_buffer(slot, Fence::new(Descriptor::new(9))).unwrap();

        let again = queue.dequeue_buffer(64, 64, format::RGBA_8888, usage::SW_WRITE_OFTEN).unwrap();
        assert_eq!(again.slot, slot);
        assert_eq!(again.fence.descriptor(), Some(Descriptor::new(9)));
    }

    #[test]
    fn test_queue_requires_dequeued_slot() {
        let queue = connected(BufferQueue::builder());
        let err = queue.queue_buffer(0, frame(1)).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);

        let err = queue.cancel_buffer(0, Fence::no_fence()).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);

        let err = queue.queue_buffer(-1, frame(1)).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
    }

    #[test]
    fn test_queue_requires_request_buffer() {
        let queue = connected(BufferQueue::builder());
        let out = queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        let err = queue.queue_buffer(out.slot, frame(1)).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
    }

    #[test]
    fn test_queue_rejects_bad_crop_and_transform() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);

        let mut input = frame(1);
        input.crop = Rect::new(0, 0, 65, 64);
        assert_eq!(status_of(queue.queue_buffer(slot, input).unwrap_err()), Status::BAD_VALUE);

        let mut input = frame(1);
        input.transform = Transform(0x10);
        assert_eq!(status_of(queue.queue_buffer(slot, input).unwrap_err()), Status::BAD_VALUE);

        assert_eq!(queue.slot_state(slot), Some(BufferState::Dequeued));
    }

    #[test]
    fn test_queue_twice_rejected() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.queue_buffer(slot, frame(1)).unwrap();
        let err = queue.queue_buffer(slot, frame(2)).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
    }

    #[test]
    fn test_synchronous_queue_keeps_order() {
        let queue = connected(BufferQueue::builder().synchronous(true));
        let a = produce(&queue);
        queue.queue_buffer(a, frame(10)).unwrap();
        let b = produce(&queue);
        let out = queue.queue_buffer(b, frame(20)).unwrap();
        assert_eq!(out.num_pending_buffers, 2);
        assert_eq!(queue.query(QueryKey::ConsumerRunningBehind).unwrap(), 1);

        let first = queue.acquire_buffer().unwrap().unwrap();
        assert_eq!((first.slot, first.timestamp), (a, 10));
        queue.release_with_fence(first.slot, Fence::no_fence()).unwrap();

        let second = queue.acquire_buffer().unwrap().unwrap();
        assert_eq!((second.slot, second.timestamp), (b, 20));
        assert!(queue.acquire_buffer().is_err());
    }

    #[test]
    fn test_async_queue_replaces_pending_frame() {
        let queue = connected(BufferQueue::builder());
        let a = produce(&queue);
        queue.queue_buffer(a, frame(10)).unwrap();
        let b = produce(&queue);
        let out = queue.queue_buffer(b, frame(20)).unwrap();

        assert_eq!(out.num_pending_buffers, 1);
        assert_eq!(queue.slot_state(a), Some(BufferState::Free));

        let acquired = queue.acquire_buffer().unwrap().unwrap();
        assert_eq!(acquired.slot, b);
        assert_eq!(acquired.timestamp, 20);
    }

    #[test]
    fn test_acquire_empty_queue() {
        let queue = connected(BufferQueue::builder());
        assert!(queue.acquire_buffer().unwrap().is_none());
    }

    #[test]
    fn test_release_requires_acquired() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        let err = queue.release_with_fence(slot, Fence::no_fence()).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
    }

    #[test]
    fn test_dequeue_limit_after_first_queue() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.queue_buffer(slot, frame(1)).unwrap();

        let _held = produce(&queue);
        let err = queue.dequeue_buffer(64, 64, 0, 0).unwrap_err();
        assert_eq!(status_of(err), Status::BUSY);
    }

    #[test]
    fn test_set_buffer_count_busy_while_dequeued() {
        let queue = connected(BufferQueue::builder());
        let _slot = produce(&queue);

        let err = queue.set_buffer_count(4).unwrap_err();
        assert_eq!(status_of(err), Status::BUSY);
        assert_eq!(queue.buffer_count(), 3);
    }

    #[test]
    fn test_set_buffer_count_bounds() {
        let queue = connected(BufferQueue::builder());
        assert_eq!(status_of(queue.set_buffer_count(-1).unwrap_err()), Status::BAD_VALUE);
        assert_eq!(status_of(queue.set_buffer_count(33).unwrap_err()), Status::BAD_VALUE);
        assert_eq!(status_of(queue.set_buffer_count(2).unwrap_err()), Status::BAD_VALUE);
    }

    #[test]
    fn test_set_buffer_count_resets_pool() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.cancel_buffer(slot, Fence::no_fence()).unwrap();

        queue.set_buffer_count(5).unwrap();
        assert_eq!(queue.buffer_count(), 5);
        assert_eq!(queue.request_buffer(slot).unwrap(), None);

        let out = queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        assert!(out.flags.contains(DequeueFlags::RELEASE_ALL_BUFFERS));
        assert!(out.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));

        queue.cancel_buffer(out.slot, Fence::no_fence()).unwrap();
        queue.set_buffer_count(0).unwrap();
        assert_eq!(queue.buffer_count(), 3);
    }

    /// Fails the first allocation, then delegates.
    struct FailOnce {
        failed: std::sync::atomic::AtomicBool,
        inner: SyntheticAllocator,
    }

    impl BufferAllocator for FailOnce {
        fn allocate(
            &self,
            width: u32,
            height: u32,
            format: u32,
            usage: u32,
        ) -> Result<GraphicBuffer> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(SurfaceError::remote(Status::NO_MEMORY));
            }
            self.inner.allocate(width, height, format, usage)
        }
    }

    #[test]
    fn test_release_all_survives_failed_allocation() {
        let allocator = Arc::new(FailOnce {
            failed: std::sync::atomic::AtomicBool::new(true),
            inner: SyntheticAllocator::new(),
        });
        let queue = connected(BufferQueue::builder().allocator(allocator.clone()));
        queue.set_buffer_count(5).unwrap();

        allocator.failed.store(false, std::sync::atomic::Ordering::SeqCst);
        let err = queue.dequeue_buffer(64, 64, 0, 0).unwrap_err();
        assert_eq!(status_of(err), Status::NO_MEMORY);
        assert_eq!(queue.slot_state(0), Some(BufferState::Free));

        let out = queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        assert!(out.flags.contains(DequeueFlags::RELEASE_ALL_BUFFERS));
        assert!(out.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));

        queue.cancel_buffer(out.slot, Fence::no_fence()).unwrap();
        let again = queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        assert!(!again.flags.contains(DequeueFlags::RELEASE_ALL_BUFFERS));
    }

    #[test]
    fn test_dequeue_times_out() {
        let queue = connected(BufferQueue::builder().dequeue_timeout(Duration::from_millis(20)));
        for _ in 0..3 {
            queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        }
        let err = queue.dequeue_buffer(64, 64, 0, 0).unwrap_err();
        assert_eq!(status_of(err), Status::WOULD_BLOCK);
    }

    #[test]
    fn test_blocked_dequeue_wakes_on_cancel() {
        let queue = Arc::new(connected(
            BufferQueue::builder().dequeue_timeout(Duration::from_secs(5)),
        ));
        let slots: Vec<i32> = (0..3)
            .map(|_| queue.dequeue_buffer(64, 64, 0, 0).unwrap().slot)
            .collect();

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_buffer(64, 64, 0, 0))
        };
        thread::sleep(Duration::from_millis(20));
        queue.cancel_buffer(slots[1], Fence::no_fence()).unwrap();

        let out = waiter.join().unwrap().unwrap();
        assert_eq!(out.slot, slots[1]);
    }

    #[test]
    fn test_abandon_wakes_and_fails() {
        let queue = Arc::new(connected(BufferQueue::builder()));
        for _ in 0..3 {
            queue.dequeue_buffer(64, 64, 0, 0).unwrap();
        }

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_buffer(64, 64, 0, 0))
        };
        thread::sleep(Duration::from_millis(20));
        queue.abandon();

        let err = waiter.join().unwrap().unwrap_err();
        assert_eq!(status_of(err), Status::NO_INIT);
        assert_eq!(status_of(queue.query(QueryKey::Width).unwrap_err()), Status::NO_INIT);
        assert!(queue.disconnect(Api::Cpu).is_ok());
    }

    #[test]
    fn test_connect_twice() {
        let queue = connected(BufferQueue::builder());
        let err = queue.connect(Api::Egl).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
        assert_eq!(queue.connected_api(), Some(Api::Cpu));
    }

    #[test]
    fn test_disconnect_twice() {
        let queue = connected(BufferQueue::builder());
        queue.disconnect(Api::Cpu).unwrap();
        let err = queue.disconnect(Api::Cpu).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
        assert_eq!(queue.connected_api(), None);
    }

    #[test]
    fn test_disconnect_wrong_api() {
        let queue = connected(BufferQueue::builder());
        let err = queue.disconnect(Api::Media).unwrap_err();
        assert_eq!(status_of(err), Status::BAD_VALUE);
        assert_eq!(queue.connected_api(), Some(Api::Cpu));
    }

    #[test]
    fn test_disconnect_frees_slots() {
        let queue = connected(BufferQueue::builder());
        let slot = produce(&queue);
        queue.disconnect(Api::Cpu).unwrap();
        assert_eq!(queue.slot_state(slot), Some(BufferState::Free));
        assert_eq!(queue.request_buffer(slot).unwrap(), None);
    }

    #[test]
    fn test_query_values() {
        let queue = connected(
            BufferQueue::builder()
                .transform_hint(Transform::ROT_90.bits())
                .consumer_usage(usage::HW_TEXTURE),
        );
        assert_eq!(queue.query(QueryKey::DefaultWidth).unwrap(), 64);
        assert_eq!(queue.query(QueryKey::Format).unwrap(), format::RGBA_8888 as i32);
        assert_eq!(queue.query(QueryKey::TransformHint).unwrap(), 4);
        assert_eq!(queue.query(QueryKey::ConsumerUsageBits).unwrap(), usage::HW_TEXTURE as i32);
        assert_eq!(queue.query(QueryKey::ConsumerRunningBehind).unwrap(), 0);
    }

    #[test]
    fn test_consumer_usage_added_to_allocations() {
        let queue = connected(BufferQueue::builder().consumer_usage(usage::HW_TEXTURE));
        let out = queue.dequeue_buffer(64, 64, 0, usage::SW_WRITE_OFTEN).unwrap();
        let buffer = queue.request_buffer(out.slot).unwrap().unwrap();
        assert_eq!(buffer.usage, usage::SW_WRITE_OFTEN | usage::HW_TEXTURE);
    }

    #[test]
    fn test_switch_to_async_drops_stale_frames() {
        let queue = connected(BufferQueue::builder().synchronous(true).default_buffer_count(4));
        let a = produce(&queue);
        queue.queue_buffer(a, frame(1)).unwrap();
        let b = produce(&queue);
        queue.queue_buffer(b, frame(2)).unwrap();

        queue.set_synchronous_mode(false).unwrap();
        assert_eq!(queue.queued_count(), 1);
        assert_eq!(queue.slot_state(a), Some(BufferState::Free));
        assert!(!queue.is_synchronous());
    }

    #[test]
    fn test_update_and_get_current() {
        let queue = connected(BufferQueue::builder());
        assert_eq!(queue.update_and_get_current().unwrap(), None);

        let a = produce(&queue);
        queue.queue_buffer(a, frame(1)).unwrap();
        let (slot, _) = queue.update_and_get_current().unwrap().unwrap();
        assert_eq!(slot, a);
        assert_eq!(queue.slot_state(a), Some(BufferState::Acquired));

        let b = produce(&queue);
        queue.queue_buffer(b, frame(2)).unwrap();
        let (slot, _) = queue.update_and_get_current().unwrap().unwrap();
        assert_eq!(slot, b);
        assert_eq!(queue.slot_state(a), Some(BufferState::Free));

        // Nothing new queued: the current buffer stays latched.
        let (slot, _) = queue.update_and_get_current().unwrap().unwrap();
        assert_eq!(slot, b);
    }

    #[test]
    fn test_update_and_get_current_at_acquire_limit() {
        let queue = connected(BufferQueue::builder());
        let a = produce(&queue);
        queue.queue_buffer(a, frame(1)).unwrap();
        queue.acquire_buffer().unwrap().unwrap();

        let b = produce(&queue);
        queue.queue_buffer(b, frame(2)).unwrap();
        let err = queue.update_and_get_current().unwrap_err();
        assert_eq!(status_of(err), Status::INVALID_OPERATION);

        assert_eq!(queue.slot_state(a), Some(BufferState::Acquired));
        assert_eq!(queue.slot_state(b), Some(BufferState::Queued));
        assert_eq!(queue.queued_count(), 1);

        // Once the consumer lets go, latching proceeds.
        queue.release_with_fence(a, Fence::no_fence()).unwrap();
        let (slot, _) = queue.update_and_get_current().unwrap().unwrap();
        assert_eq!(slot, b);
    }

    #[test]
    fn test_release_buffer_clears_current() {
        let queue = connected(BufferQueue::builder());
        let a = produce(&queue);
        queue.queue_buffer(a, frame(1)).unwrap();
        queue.update_and_get_current().unwrap();

        queue.release_buffer(a).unwrap();
        assert_eq!(queue.update_and_get_current().unwrap(), None);
    }

    #[test]
    fn test_add_buffer_slot() {
        let queue = connected(BufferQueue::builder());
        let buffer = GraphicBuffer::new(900, 64, 64, format::RGBA_8888, usage::SW_WRITE_OFTEN);

        let slot = queue.add_buffer_slot(buffer.clone()).unwrap();
        assert_eq!(slot, 0);

        let out = queue.dequeue_buffer(64, 64, format::RGBA_8888, usage::SW_WRITE_OFTEN).unwrap();
        assert_eq!(out.slot, 0);
        assert!(!out.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
        assert_eq!(queue.request_buffer(0).unwrap(), Some(buffer));
    }

    #[test]
    fn test_add_buffer_slot_full() {
        let queue = connected(BufferQueue::builder());
        for id in 0..3 {
            queue.add_buffer_slot(GraphicBuffer::new(id, 8, 8, format::RGBA_8888, 0)).unwrap();
        }
        let err = queue
            .add_buffer_slot(GraphicBuffer::new(3, 8, 8, format::RGBA_8888, 0))
            .unwrap_err();
        assert_eq!(status_of(err), Status::NO_MEMORY);
    }

    #[test]
    fn test_get_id_is_name() {
        let queue = BufferQueue::builder().name("camera").build();
        assert_eq!(queue.get_id().unwrap(), "camera");
    }

    #[test]
    fn test_from_config() {
        let config = QueueConfig::from_json_str(
            r#"{"name": "cfg", "default_buffer_count": 6, "capabilities": {"extended": true}}"#,
        )
        .unwrap();
        let queue = BufferQueue::from_config(config);
        assert_eq!(queue.name(), "cfg");
        assert_eq!(queue.buffer_count(), 6);
        assert!(queue.capabilities().extended);
    }
}
