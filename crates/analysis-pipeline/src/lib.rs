pub mod candidates;
pub mod jobs;
pub mod pipeline;

pub use candidates::*;
pub use jobs::*;
pub use pipeline::*;
