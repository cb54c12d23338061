//! Bounded hand-off between the generator and the display controller
//!
//! A thin layer over a bounded tokio channel. The producer reserves a slot
//! before it starts on an idea, so an idea in flight already counts against
//! capacity and the queue can never overflow once the work is done.

use crate::animation::Animation;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, OwnedPermit};
use tracing::debug;
use vfd_core::{Result, VfdError};

/// Create a queue holding at most `capacity` animations
pub fn work_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueProducer {
            tx,
            depth: Arc::clone(&depth),
        },
        QueueConsumer { rx, depth },
    )
}

/// Sending half, owned by the generator
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<Animation>,
    depth: Arc<AtomicUsize>,
}

/// A reserved place in the queue
///
/// Dropping the slot without pushing gives the capacity back.
#[derive(Debug)]
pub struct QueueSlot {
    permit: OwnedPermit<Animation>,
    depth: Arc<AtomicUsize>,
}

impl QueueSlot {
    pub fn push(self, animation: Animation) {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.permit.send(animation);
    }
}

impl QueueProducer {
    /// Wait for a free slot
    ///
    /// Polls `running` every `poll` while the queue is full and gives up with
    /// `None` once it is cleared or the consumer is gone.
    pub async fn reserve_while(&self, running: &AtomicBool, poll: Duration) -> Option<QueueSlot> {
        while running.load(Ordering::Acquire) {
            match tokio::time::timeout(poll, self.tx.clone().reserve_owned()).await {
                Ok(Ok(permit)) => {
                    return Some(QueueSlot {
                        permit,
                        depth: Arc::clone(&self.depth),
                    })
                }
                Ok(Err(_)) => return None,
                Err(_) => debug!("Queue full, deferring"),
            }
        }
        None
    }

    /// Push directly, waiting for capacity
    pub async fn push(&self, animation: Animation) -> Result<()> {
        let permit = self
            .tx
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| VfdError::QueueClosed)?;
        QueueSlot {
            permit,
            depth: Arc::clone(&self.depth),
        }
        .push(animation);
        Ok(())
    }

    /// Animations waiting to be played
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving half, owned by the display controller
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::Receiver<Animation>,
    depth: Arc<AtomicUsize>,
}

impl QueueConsumer {
    /// Next animation, or `None` if nothing arrives within `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Animation> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(animation)) => Some(self.taken(animation)),
            _ => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<Animation> {
        match self.rx.try_recv() {
            Ok(animation) => Some(self.taken(animation)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn taken(&self, animation: Animation) -> Animation {
        self.depth.fetch_sub(1, Ordering::AcqRel);
        animation
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
