//! Derive macro for `pof-core` portable objects.
//!
//! # Example
//!
//! ```ignore
//! use pof_derive::PortableObject;
//!
//! #[derive(Default, PortableObject)]
//! struct Person {
//!     name: String,
//!     #[pof(index = 3)]
//!     age: i32,
//!     #[pof(skip)]
//!     cached_greeting: String,
//! }
//! ```

extern crate proc_macro;

mod portable;

use proc_macro::TokenStream;

/// Derives the `PortableObject` trait for a struct with named fields.
///
/// Each field is written at a property index. Indices default to the field
/// position among serialized fields, continuing after the last explicit
/// index, and must strictly increase in declaration order.
///
/// # Attributes
///
/// ## Field-level
/// - `#[pof(index = N)]` sets the property index of the field.
/// - `#[pof(skip)]` skips this field; it reads back as `Default::default()`.
///
/// Every serialized field type must implement `pof_core::PofField`, and the
/// struct must implement `Default`.
#[proc_macro_derive(PortableObject, attributes(pof))]
pub fn derive_portable(input: TokenStream) -> TokenStream {
    portable::derive_portable_impl(input)
}
