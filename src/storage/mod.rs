// src/storage/mod.rs — Local SQLite persistence

pub mod schema;
pub mod store;
