pub mod analysis; // LLM provider chain and prompts
pub mod config;
pub mod db;
pub mod email; // Subject parsing and clinical-text segmentation
pub mod extraction; // PDF to text
pub mod mail; // Inbox sources
pub mod models;
pub mod pipeline; // Classify, merge, gate, orchestrate
