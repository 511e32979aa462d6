pub mod adapter;
pub mod limiter;
pub mod pool;

pub use adapter::*;
pub use limiter::*;
pub use pool::*;
