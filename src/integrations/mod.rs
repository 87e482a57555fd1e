// src/integrations/mod.rs — External service adapters

pub mod disk;
pub mod geocode;
pub mod sheets;
pub mod telegram;
pub mod types;
