//! Fuzz target for `pool`-prefixed data source arguments.
//!
//! Run with: cargo +nightly fuzz run fuzz_prefixed_args
//!
//! Interprets the input as `key=value` lines, extracts a data source
//! definition from them and builds it with the built-in classes. Building
//! never opens a connection, so arbitrary paths are harmless.

#![no_main]

use indexmap::IndexMap;
use libfuzzer_sys::fuzz_target;
use termbank_core::{DataSourceArgs, ResourceBuilder};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut args: IndexMap<String, String> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let before = args.len();

    let parsed = DataSourceArgs::take_from(&mut args);
    assert!(args.len() <= before);
    assert!(args.keys().all(|k| k != "dataSource" && k != "poolClassName"));

    let name = parsed.name.unwrap_or_default();
    let _ = ResourceBuilder::with_builtins().build(&name, parsed.definition);
});
