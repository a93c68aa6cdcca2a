//! Test Helper Utilities
//!
//! Shared utilities for testing beatfunc-server

#![allow(dead_code)]

pub mod app;
pub mod audio_generator;
pub mod stub_engine;

pub use app::{multipart_body, TestApp};
pub use audio_generator::{generate_test_wav, AudioConfig};
pub use stub_engine::{CountingEngine, FailingDownloader, FixtureDownloader};
