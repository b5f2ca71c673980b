pub mod attachments;
pub mod convert;
pub mod error;
pub mod logger;
pub mod normalize;
pub mod questions;
pub mod xml_map;

/// Default directory the upload files are written to.
pub static DEFAULT_OUTPUT_DIR: &str = "output";

pub use convert::{convert, load_quiz, CategoryExport, OutputFile};
pub use error::ConvertError;
pub use questions::{Question, QuestionDetail};
pub use xml_map::{parse_document, XmlValue};
