pub mod submission;

pub use submission::{ProcessOutcome, SkipReason, process_submission};
