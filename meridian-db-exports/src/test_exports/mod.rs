// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This file exports testing utilities for the database interface

mod mock;

pub use mock::MemoryDb;
