pub mod error;
pub mod ident;

pub use error::{Error, Result};
pub use ident::validate_table_name;
