pub mod job;
pub mod queue;
pub mod registry;
pub mod worker;

pub use job::*;
pub use queue::*;
pub use registry::*;
pub use worker::*;
