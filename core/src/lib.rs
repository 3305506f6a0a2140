//! Core utilities shared by the discovery, inventory and reconciliation crates.

pub mod sanitize;

pub use sanitize::{clean, CleanMode, UNSPECIFIED};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
