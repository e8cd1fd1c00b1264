pub mod invoice;
pub mod metadata;

pub use invoice::*;
pub use metadata::*;
