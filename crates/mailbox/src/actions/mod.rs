//! Label-mutating actions
//!
//! Provides the optimistic mutation engine: policy check, remote call, then
//! reconciliation of the shared page cache once the call has succeeded.

mod handler;
mod outcome;

pub use handler::ActionHandler;
pub use outcome::ActionOutcome;
