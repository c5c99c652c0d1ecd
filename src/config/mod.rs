// ABOUTME: Server configuration assembled from environment variables with typed defaults.
// ABOUTME: Mirrors the teacher's env_var_or/from_env() pattern instead of ad hoc std::env::var calls.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod environment;

pub use environment::{LogLevel, ServerConfig};
