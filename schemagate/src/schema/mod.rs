pub mod directive;
pub mod parser;
pub mod snapshot;
pub mod types;

pub use directive::{Directive, FieldBuilder, IndexSpec};
pub use parser::{parse_table_sdl, parse_table_sdl_file};
pub use snapshot::{DatabaseInfo, SchemaSnapshot};
pub use types::*;
