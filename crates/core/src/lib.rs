pub mod catalog;
pub mod error;
pub mod extract;
pub mod models;

pub use catalog::*;
pub use error::ClientError;
pub use extract::{parse_extracted_intent, strip_code_fences};
pub use models::*;
