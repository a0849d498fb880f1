// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.
//!
//! Codes: 1 runtime failure, 2 missing prerequisite, 3 LLM backend
//! unavailable.

use std::fmt;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MISSING_PREREQUISITE: i32 = 2;
pub const EXIT_BACKEND_UNAVAILABLE: i32 = 3;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(EXIT_FAILURE, message)
    }

    pub fn missing_prerequisite(message: impl Into<String>) -> Self {
        Self::new(EXIT_MISSING_PREREQUISITE, message)
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(EXIT_BACKEND_UNAVAILABLE, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
