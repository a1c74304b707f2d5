pub mod hash;

pub use hash::{sum, Hash32};
