//! The functions offered to the model and their descriptors.

mod descriptors;
mod products;
mod result;
mod wikipedia;

pub use descriptors::*;
pub use products::*;
pub use result::*;
pub use wikipedia::*;
