//! Inbound adapters translating external input into domain calls.
//!
//! The only driving adapter is the command line of the `provision-store`
//! binary. It resolves the store target and never touches the store itself.

pub mod cli;
