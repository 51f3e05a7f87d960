// Graph module: references, mappings and their persisted definition

pub mod definition;
pub mod model;
pub mod store;

pub use definition::*;
pub use model::*;
pub use store::*;
