//! Derive macros for the chainsync crate.

use proc_macro::TokenStream;

mod error;

/// Derives `Display` and `std::error::Error` for an error enum.
///
/// Each variant declares its display message with an `#[error("...")]`
/// attribute; see `error.rs` for the supported forms.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
