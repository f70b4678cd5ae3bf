pub mod synthetic;

pub use synthetic::{Exhaustion, MemorySink, SyntheticSource};
