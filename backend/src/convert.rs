//! Category bucketing and output assembly.
//!
//! A single pass over the parsed question sequence: category-marker records
//! open a new bucket and flush the previous one, typed records are
//! dispatched to the question model, and every completed category becomes a
//! set of in-memory upload files for the caller to write.

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;

use crate::error::ConvertError;
use crate::logger;
use crate::questions::Question;
use crate::xml_map::{parse_document, XmlValue};

/// Leading path token the Moodle exporter puts on every category.
pub static CATEGORY_TOP_PREFIX: &str = "$course$/top/";

/// Bucket key for questions of an unrecognized type.
pub static UNSUPPORTED_KEY: &str = "unsupported";
/// Bucket key for questions whose conversion failed.
pub static MALFORMED_KEY: &str = "malformed";
/// Category assigned to questions that appear before any category marker.
pub static UNCATEGORIZED: &str = "uncategorized";

/// Questions of one category, grouped by type key in insertion order.
pub type QuestionBucket = IndexMap<String, Vec<Question>>;

/// One file of the upload set, kept in memory until the caller writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Everything produced for one category: per-type counts for progress
/// reporting plus the upload lines and attachment files.
#[derive(Debug, Clone)]
pub struct CategoryExport {
    pub category: String,
    pub counts: Vec<(String, usize)>,
    pub files: Vec<OutputFile>,
}

/// Parses the export document and returns the question records under the
/// quiz root, normalized to a sequence.
pub fn load_quiz(xml: &str) -> Result<Vec<XmlValue>> {
    let doc = parse_document(xml).context("failed to parse the quiz export")?;
    let quiz = doc
        .get("quiz")
        .ok_or_else(|| anyhow!("document has no quiz element"))?;
    let records = match quiz.get("question") {
        Some(XmlValue::List(items)) => items.clone(),
        Some(single) => vec![single.clone()],
        None => Vec::new(),
    };
    Ok(records)
}

/// Converts the record sequence into per-category upload files.
///
/// Per-question failures never abort the pass: an unrecognized type tag
/// lands under the `unsupported` key, a failed construction under the
/// `malformed` key, and processing continues with the next record.
pub fn convert(records: &[XmlValue]) -> Vec<CategoryExport> {
    let mut exports = Vec::new();
    let mut category: Option<String> = None;
    let mut bucket = QuestionBucket::new();

    for record in records {
        let type_tag = match record.get_str("@type") {
            Ok(tag) => tag.to_string(),
            Err(e) => {
                logger::warn(&format!("question record without a type tag: {}", e));
                category.get_or_insert_with(|| UNCATEGORIZED.to_string());
                push_question(&mut bucket, MALFORMED_KEY, Question::malformed(record));
                continue;
            }
        };

        if type_tag == "category" {
            if category.is_some() || !bucket.is_empty() {
                let finished = category
                    .take()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                exports.push(flush_bucket(&finished, std::mem::take(&mut bucket)));
            }
            match extract_category(record) {
                Ok(name) => category = Some(name),
                Err(e) => {
                    logger::warn(&format!("unusable category marker: {}", e));
                    push_question(&mut bucket, MALFORMED_KEY, Question::malformed(record));
                }
            }
            continue;
        }

        // A question before any marker opens the implicit category.
        category.get_or_insert_with(|| UNCATEGORIZED.to_string());

        match Question::from_record(&type_tag, record) {
            Some(Ok(question)) => push_question(&mut bucket, &type_tag, question),
            Some(Err(e)) => {
                logger::warn(&format!("failed to convert a {} question: {}", type_tag, e));
                push_question(&mut bucket, MALFORMED_KEY, Question::malformed(record));
            }
            None => {
                logger::warn(&format!("unsupported question type: {}", type_tag));
                push_question(&mut bucket, UNSUPPORTED_KEY, Question::malformed(record));
            }
        }
    }

    if category.is_some() || !bucket.is_empty() {
        let finished = category.unwrap_or_else(|| UNCATEGORIZED.to_string());
        exports.push(flush_bucket(&finished, bucket));
    }

    exports
}

/// The category path from a marker record, with the fixed top-level prefix
/// stripped.
fn extract_category(record: &XmlValue) -> Result<String, ConvertError> {
    let text = record
        .get_required("category")?
        .get_text("text")?
        .ok_or_else(|| ConvertError::missing("category text"))?;
    Ok(text.replace(CATEGORY_TOP_PREFIX, ""))
}

fn push_question(bucket: &mut QuestionBucket, key: &str, question: Question) {
    bucket.entry(key.to_string()).or_default().push(question);
}

/// Turns one category's bucket into files: one text file per type key with
/// one export line per question, plus a sibling file per attachment. Path
/// separators in the category name are replaced before it is used as a
/// file-name component.
fn flush_bucket(category: &str, bucket: QuestionBucket) -> CategoryExport {
    let safe = sanitize_category(category);
    let mut counts = Vec::new();
    let mut files = Vec::new();

    for (type_key, questions) in &bucket {
        counts.push((type_key.clone(), questions.len()));
        let root = format!("{}_{}", safe, type_key);

        let mut body = String::new();
        for question in questions {
            body.push_str(&question.export_line());
            body.push('\n');
            for attachment in &question.attachments {
                files.push(OutputFile {
                    filename: format!("{}_{}", root, attachment.name),
                    content: attachment.content.clone(),
                });
            }
        }

        files.push(OutputFile {
            filename: format!("{}.txt", root),
            content: body.into_bytes(),
        });
    }

    CategoryExport {
        category: category.to_string(),
        counts,
        files,
    }
}

pub fn sanitize_category(category: &str) -> String {
    category.replace(['/', '\\'], "_")
}
