pub mod adapter;
pub mod config;
pub mod error;
pub mod introspection;
pub mod migration;
pub mod schema;
pub mod validation;
pub mod value;

pub use error::{Result, SchemaGateError};
pub use schema::SchemaSnapshot;
pub use value::{Document, Value};
