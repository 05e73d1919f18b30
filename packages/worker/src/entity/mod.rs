//! Rows read and written by the execution pipeline. The schema itself is owned
//! by the application layer; these mirror the columns this worker touches.

pub mod language;
pub mod problem;
pub mod submission;
pub mod test_case;
pub mod test_case_result;
