//! Meridian Channel is a crossbeam channel wrapper with prometheus metrics.
//! For each channel it exposes:
//! - actual length of the channel (inc() when sending, set from len() when receiving)
//! - total received messages (inc() when receiving)
//!
//! # Example
//! ```
//! use meridian_channel::MeridianChannel;
//! let (sender, receiver) = MeridianChannel::new::<String>("doc_test".to_string(), None);
//! ```
//!
//! # Warning
//! When a receiver is used inside a `select!` macro, `recv()` is not the one
//! pulling the message out, so metrics are not updated automatically: call
//! `your_receiver.update_metrics()` in the matching arm.

use std::sync::Arc;

use receiver::MeridianReceiver;
use sender::MeridianSender;
use tracing::debug;

pub mod receiver;
pub mod sender;

#[derive(Clone)]
pub struct MeridianChannel {}

impl MeridianChannel {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(name: String, capacity: Option<usize>) -> (MeridianSender<T>, MeridianReceiver<T>) {
        use prometheus::{Counter, Gauge};

        let (s, r) = if let Some(capacity) = capacity {
            crossbeam::channel::bounded::<T>(capacity)
        } else {
            crossbeam::channel::unbounded::<T>()
        };

        let actual_len = Gauge::new(
            format!("{}_channel_actual_size", name),
            "Actual length of channel",
        )
        .expect("Failed to create gauge");

        let received = Counter::new(
            format!("{}_channel_total_receive", name),
            "Total received messages",
        )
        .expect("Failed to create counter");

        // Registration can fail if the same channel name is created twice
        // (e.g. in tests); the channel itself still works.
        if let Err(e) = prometheus::register(Box::new(actual_len.clone())) {
            debug!("Failed to register actual_len gauge for {} : {}", name, e);
        }

        if let Err(e) = prometheus::register(Box::new(received.clone())) {
            debug!("Failed to register received counter for {} : {}", name, e);
        }

        let sender = MeridianSender {
            sender: s,
            name: name.clone(),
            actual_len: actual_len.clone(),
        };

        let receiver = MeridianReceiver {
            receiver: r,
            name,
            actual_len,
            received,
            ref_counter: Arc::new(()),
        };

        (sender, receiver)
    }
}
