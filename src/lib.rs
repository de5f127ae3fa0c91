// src/lib.rs

//! Incremental mirror of the debian-devel-changes archive and the upload
//! history extracted from it.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
