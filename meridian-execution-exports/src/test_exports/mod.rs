// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exposes useful tooling to test the execution ingestion
//! engine: programmable fakes for every collaborator and fixture factories.

mod config;
mod mock;
mod tools;

pub use config::default_testing_config;
pub use mock::{
    ComputeCall, MockBlockComputer, MockChainState, MockCollectionRequester, MockUploader,
};
pub use tools::{
    block_with_guarantees, collection_fixture, commitment_for, empty_block, genesis_block,
    node_id_fixture,
};
