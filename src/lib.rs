// src/lib.rs — Library root for haulbot

pub mod engine;
pub mod infra;
pub mod integrations;
pub mod pipeline;
pub mod storage;
