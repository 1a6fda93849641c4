//! Core types and traits for the repokit data-access framework.
//!
//! Everything here is pure: entity and query types, validation, document
//! mapping, cache keys and policies, argument redaction, and the traits the
//! shell crate implements against real backends.

pub mod cache;
pub mod entity;
pub mod query;
pub mod storage;
pub mod trace;
