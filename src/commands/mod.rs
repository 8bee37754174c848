pub mod run;

// Re-export command functions for convenience
pub use run::{run, RunOptions};
