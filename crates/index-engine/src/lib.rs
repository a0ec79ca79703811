pub mod baseline;
pub mod chain;
pub mod influence;

pub use baseline::*;
pub use chain::*;
pub use influence::*;
