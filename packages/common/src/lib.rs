pub mod error;
pub mod id_generator;
pub mod namespace;
pub mod ordered;
pub mod result;

pub use error::*;
pub use id_generator::*;
pub use namespace::*;
pub use ordered::*;
pub use result::*;
