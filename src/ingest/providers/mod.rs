// src/ingest/providers/mod.rs
pub mod robots;
pub mod site;
pub mod youtube;
