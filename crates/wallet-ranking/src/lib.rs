pub mod aggregate;
pub mod scoring;

pub use aggregate::*;
pub use scoring::*;
