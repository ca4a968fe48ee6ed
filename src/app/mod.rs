
pub use load_test::{run_load_test, RunOutcome, RunSettings};
