pub mod backend;
pub mod distance;
pub mod index;
pub mod pqueue;

pub use backend::DistanceBackend;
pub use index::{FlatIndex, FlatIndexError};

#[cfg(test)]
mod tests;
