// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    invalid_config = { Error::invalid_config("queue.max_size", "must be at least 1"), "queue.max_size" },
    drop_strategy = { Error::InvalidDropStrategy("drop-all".into()), "drop-all" },
    state = { Error::InvalidState("sleeping".into()), "sleeping" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn drop_strategy_error_lists_valid_values() {
    let msg = Error::InvalidDropStrategy("x".into()).to_string();
    assert!(msg.contains("drop-oldest"));
    assert!(msg.contains("drop-newest"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn error_from_toml() {
    let toml_err = toml::from_str::<toml::Table>("= broken").unwrap_err();
    let err: Error = toml_err.into();
    assert!(matches!(err, Error::ConfigParse(_)));
}
