#![deny(missing_docs)]

//! Core library for the Labtract report extraction service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// LLM provider client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Extraction metrics helpers.
pub mod metrics;
/// OCR provider integration and job lifecycle management.
pub mod ocr;
/// Document-to-table extraction pipeline.
pub mod pipeline;
/// Blob staging and artifact storage integration.
pub mod storage;
