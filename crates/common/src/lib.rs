pub mod types;

pub use types::StreamId;
