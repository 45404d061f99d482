//! Channel transport backed by a tokio serve task.
//!
//! # Architecture
//!
//! ```text
//! Producer thread ─► ChannelTransport ─► mpsc::Sender<Transaction> ─► Serve Task
//!        ▲                                                                │
//!        └───────────────────── oneshot reply ◄── Dispatcher ◄────────────┘
//! ```
//!
//! Parcels cross the channel as raw parts (bytes plus descriptors), the way
//! they would cross a process boundary. The serve task handles one
//! transaction at a time, in arrival order; the call itself runs on the
//! blocking pool because an implementation may wait (a dequeue blocks until
//! a slot frees up).
//!
//! [`ChannelTransport::transact`] blocks the calling thread. Call it from a
//! plain thread or `spawn_blocking`, never from inside an async task.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::Transport;
use crate::error::{Result, SurfaceError};
use crate::handle::Descriptor;
use crate::handler::Dispatcher;
use crate::protocol::{Parcel, FLAG_ONEWAY};
use crate::status::Status;
use crate::surface::SurfaceTexture;

/// Default number of transactions buffered in the channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the serve task.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel capacity for queued transactions.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

type ReplyParts = Result<(Bytes, Vec<Descriptor>)>;

/// A transaction in flight.
#[derive(Debug)]
struct Transaction {
    code: u32,
    flags: u32,
    data: Bytes,
    descriptors: Vec<Descriptor>,
    /// Absent for one-way calls.
    reply: Option<oneshot::Sender<ReplyParts>>,
}

/// Producer side of a channel.
///
/// Cheap to share behind an `Arc`; callers are serialized.
pub struct ChannelTransport {
    tx: mpsc::Sender<Transaction>,
    gate: Mutex<()>,
}

impl ChannelTransport {
    /// True once the serve task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn dead_object() -> SurfaceError {
    SurfaceError::Transport(Status::DEAD_OBJECT)
}

impl Transport for ChannelTransport {
    fn transact(&self, code: u32, data: Parcel, flags: u32) -> Result<Parcel> {
        let _call = self.gate.lock();
        let (data, descriptors) = data.into_parts();

        if flags & FLAG_ONEWAY != 0 {
            let transaction = Transaction {
                code,
                flags,
                data,
                descriptors,
                reply: None,
            };
            self.tx.blocking_send(transaction).map_err(|_| dead_object())?;
            return Ok(Parcel::new());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let transaction = Transaction {
            code,
            flags,
            data,
            descriptors,
            reply: Some(reply_tx),
        };
        self.tx.blocking_send(transaction).map_err(|_| dead_object())?;

        let (bytes, fds) = reply_rx.blocking_recv().map_err(|_| dead_object())??;
        Ok(Parcel::from_parts(&bytes, fds))
    }
}

/// Spawn the serve task for `dispatcher` and return the producer side.
///
/// # Returns
///
/// A tuple of `(ChannelTransport, JoinHandle)`. The task ends when the
/// transport is dropped.
pub fn spawn_dispatcher_task<S>(
    dispatcher: Arc<Dispatcher<S>>,
    config: ChannelConfig,
) -> (ChannelTransport, JoinHandle<()>)
where
    S: SurfaceTexture + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    let transport = ChannelTransport {
        tx,
        gate: Mutex::new(()),
    };
    let task = tokio::spawn(serve_loop(rx, dispatcher));
    (transport, task)
}

async fn serve_loop<S>(mut rx: mpsc::Receiver<Transaction>, dispatcher: Arc<Dispatcher<S>>)
where
    S: SurfaceTexture + ?Sized + 'static,
{
    let mut served: u64 = 0;

    while let Some(transaction) = rx.recv().await {
        let Transaction {
            code,
            flags,
            data,
            descriptors,
            reply,
        } = transaction;

        let dispatcher = Arc::clone(&dispatcher);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut data = Parcel::from_parts(&data, descriptors);
            dispatcher
                .on_transact(code, &mut data, flags)
                .map(Parcel::into_parts)
        })
        .await;

        served += 1;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Transaction {} panicked: {}", code, e);
                Err(dead_object())
            }
        };

        match reply {
            Some(reply) => {
                if reply.send(result).is_err() {
                    debug!("Caller of transaction {} went away", code);
                }
            }
            None => {
                if let Err(e) = result {
                    debug!("One-way transaction {} failed: {}", code, e);
                }
            }
        }
    }

    debug!("Serve loop finished after {} transactions", served);
}
