pub use detection::*;
pub use errors::*;
pub use labels::*;
pub use normalize::*;
pub use protocol::*;
pub use taboo_set::*;
pub use targets::*;
pub use verdict::*;

#[cfg(test)]
mod arbitrary;
mod detection;
mod errors;
mod labels;
mod normalize;
mod protocol;
mod taboo_set;
mod targets;
mod verdict;
