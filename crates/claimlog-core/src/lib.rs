//! Core domain types for claimlog: condition catalog, log journal, and the
//! statistics derived from it.

pub mod catalog;
pub mod config;
pub mod correlation;
pub mod entry;
pub mod export;
pub mod filter;
pub mod logbook;
pub mod seed;
pub mod stats;
pub mod store;
pub mod templates;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}


#[cfg(test)]
mod tests {
    use super::version;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
