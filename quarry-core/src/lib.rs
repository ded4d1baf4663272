pub mod errors;

pub type Result<T> = std::result::Result<T, errors::QuarryError>;

pub mod analysis;
pub mod baseline;
pub mod calls;
pub mod client;
pub mod graph;
pub mod inspector;
pub mod options;
pub mod pagination;
pub mod query;
pub mod session;
pub mod table;
pub mod types;

pub mod prelude {
    pub use super::errors::{ErrorKind, QuarryError};
    pub use super::Result;
}
