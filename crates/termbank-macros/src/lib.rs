#![deny(unsafe_code)]

//! Procedural macros for termbank.
//!
//! - `#[derive(Configurable)]`: generate a property binding table that maps
//!   declarative property names onto typed struct fields

extern crate proc_macro;

mod configurable;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derive macro for declarative property binding.
///
/// Generates an implementation of `termbank_core::Configurable` whose
/// `set_property` matches a property name against a table fixed at compile
/// time and converts the value with `termbank_core::FromPropertyValue`.
/// Unknown names and unconvertible values become `PropertyError`s.
///
/// Property names default to the camelCase form of the field name
/// (`busy_timeout` → `busyTimeout`).
///
/// Supported field attributes:
/// - `#[property(rename = "name")]`: bind under an explicit name
/// - `#[property(skip)]`: not configurable
/// - `#[property(with = "path::to::setter")]`: call
///   `fn(&mut Self, &PropertyValue) -> Result<(), PropertyError>` instead of
///   assigning; lets the target reject values
///
/// # Example
///
/// ```ignore
/// use termbank_macros::Configurable;
///
/// #[derive(Default, Configurable)]
/// struct PoolSettings {
///     pub url: String,
///     pub login_timeout: u64,
///     #[property(rename = "user")]
///     pub username: String,
///     #[property(skip)]
///     pub opened: bool,
/// }
/// ```
#[proc_macro_derive(Configurable, attributes(property))]
pub fn derive_configurable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    configurable::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
