//! Re-exports the [`nethernet`] signaling client for convenient access from the binary and benches.
pub use nethernet;
