//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep transport/FFI layers decoupled from storage details.

pub mod batch_service;
pub mod property_service;
