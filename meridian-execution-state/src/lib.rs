// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Durable execution state of the node: the mapping from block id to
//! post-execution state commitment, the chained result metadata, the
//! highest-executed watermark and the persisted stop parameters.
//!
//! A block is *executed* exactly when its state commitment is present here;
//! every write path preserves that equivalence.

mod error;
mod keys;
mod result_meta;
mod store;

pub use error::ExecutionStateError;
pub use result_meta::{ResultMeta, ResultMetaDeserializer, ResultMetaSerializer};
pub use store::ExecutionStateStore;
