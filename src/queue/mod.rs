//! Sequential delayed queue: slot scheduling and completion signalling.

pub mod completion;
pub mod delayed;

pub use completion::Completion;
pub use delayed::DelayedQueue;
