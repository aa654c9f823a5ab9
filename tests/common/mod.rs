//! Common test utilities for mol2-pdbqt integration tests

#[allow(dead_code)]
pub mod converters;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use converters::*;
#[allow(unused_imports)]
pub use fixtures::*;
