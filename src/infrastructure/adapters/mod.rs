//! Adapters - Operator-facing integrations

pub mod console;

pub use console::ConsoleAdapter;
