//! # api-scanner
//!
//! Suggests which dependencies of a JVM build are part of its ABI (`api`) and
//! which are only used internally (`implementation`), by reading compiled
//! class files instead of sources.
//!
//! ## Architecture
//!
//! - **model**: Type names, decoded class structure and per-artifact scan results
//! - **descriptor**: Field/method descriptor decoding and type name normalization
//! - **classfile**: Class file decoder (constant pool, members, annotations)
//! - **extract**: Declared/consumed type extraction from the visible surface
//! - **scan**: Artifact scanning over directories and jar archives
//! - **classify**: API/implementation partition of first-level dependencies
//! - **manifest**: Resolved dependency graph input and closure flattening
//! - **analyze**: End-to-end scan and classification of a manifest
//! - **report**: Text and JSON renderings of a classification

pub mod analyze;
pub mod classfile;
pub mod classify;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod extract;
pub mod manifest;
pub mod model;
pub mod report;
pub mod scan;
