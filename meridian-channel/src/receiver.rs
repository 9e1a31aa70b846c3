use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crossbeam::channel::{Receiver, RecvError, TryRecvError};
use prometheus::{Counter, Gauge};

#[derive(Clone)]
pub struct MeridianReceiver<T> {
    pub(crate) receiver: Receiver<T>,
    #[allow(dead_code)]
    pub(crate) name: String,
    /// channel size
    pub(crate) actual_len: Gauge,
    /// total received messages
    pub(crate) received: Counter,
    /// reference counter to know how many receivers are cloned
    pub(crate) ref_counter: Arc<()>,
}

impl<T> Drop for MeridianReceiver<T> {
    fn drop(&mut self) {
        let ref_count = Arc::strong_count(&self.ref_counter);
        if ref_count == 1 {
            // last ref, unregister the metrics
            let _ = prometheus::unregister(Box::new(self.actual_len.clone()));
            let _ = prometheus::unregister(Box::new(self.received.clone()));
        }
    }
}

impl<T> MeridianReceiver<T> {
    /// Update the metrics manually.
    /// Needed when the receiver is polled through `select!`, which bypasses
    /// `recv()`.
    pub fn update_metrics(&self) {
        self.actual_len.set(self.receiver.len() as f64);
        self.received.inc();
    }

    /// attempt to receive a message from the channel
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match self.receiver.try_recv() {
            Ok(msg) => {
                self.update_metrics();
                Ok(msg)
            }
            Err(TryRecvError::Empty) => Err(TryRecvError::Empty),
            Err(TryRecvError::Disconnected) => {
                let _ = prometheus::unregister(Box::new(self.actual_len.clone()));
                let _ = prometheus::unregister(Box::new(self.received.clone()));
                Err(TryRecvError::Disconnected)
            }
        }
    }

    pub fn recv(&self) -> Result<T, RecvError> {
        match self.receiver.recv() {
            Ok(msg) => {
                self.update_metrics();
                Ok(msg)
            }
            Err(e) => {
                let _ = prometheus::unregister(Box::new(self.actual_len.clone()));
                let _ = prometheus::unregister(Box::new(self.received.clone()));
                Err(e)
            }
        }
    }
}

impl<T> Deref for MeridianReceiver<T> {
    type Target = Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl<T> DerefMut for MeridianReceiver<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}
