#![allow(missing_docs, dead_code)]
//! Shared benchmark support: runtimes and data generators.

pub mod generators;
pub mod harness;
