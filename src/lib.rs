// src/lib.rs — Library root for psalm-pairs

pub mod batch;
pub mod cli;
pub mod evaluator;
pub mod generator;
pub mod infra;
pub mod pairs;
pub mod provider;
pub mod psalms;
pub mod site;
pub mod store;
pub mod usage;
