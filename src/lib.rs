// Core record types and parsing
pub mod content_masker;
pub mod log_parser;
pub mod log_record;
pub mod loghub_loader;
pub mod tabular;

// LLM transport
pub mod llm_config;
pub mod llm_service;
pub mod prompts;

// Dependency injection seam for inference and datasets
pub mod implementations;
pub mod traits;

// Pipeline stages
pub mod analysis;
pub mod evaluate;
pub mod pipeline;
pub mod rca;
pub mod sampling;

pub mod config;
