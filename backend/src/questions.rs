//! Question model: one variant per supported Moodle question type.
//!
//! Each variant knows how to populate itself from a parsed record and how to
//! serialize itself to one line of the Blackboard Ultra bulk-upload format.
//! Construction never panics on bad input: every failure is a `ConvertError`
//! value the orchestrator folds into the malformed bucket.

use lazy_static::lazy_static;
use regex::Regex;

use crate::attachments::{self, Attachment};
use crate::error::ConvertError;
use crate::normalize::{normalize, TextFormat};
use crate::xml_map::XmlValue;

/// Placeholder symbols for fill-in-the-blank questions, assigned to blanks
/// in order of appearance.
pub const CLOZE_SYMBOLS: [char; 10] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j'];

lazy_static! {
    static ref RE_CLOZE_GROUP: Regex = Regex::new(r"\{(.*?)\}").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correctness {
    Correct,
    Incorrect,
}

impl Correctness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Correctness::Correct => "correct",
            Correctness::Incorrect => "incorrect",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Normalized rich-text body. Never contains raw newlines; for the
    /// fill-in-the-blank variants it never contains unescaped square
    /// brackets other than the generated placeholders.
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub detail: QuestionDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionDetail {
    /// Not a question type in Blackboard Ultra, recorded but not importable.
    Description,
    /// The raw dump of a record that could not be converted.
    Malformed,
    Matching {
        pairs: Vec<(String, String)>,
    },
    MultiChoice {
        options: Vec<(String, Correctness)>,
    },
    Essay {
        general_feedback: String,
        grader_info: String,
    },
    Cloze {
        blanks: Vec<(char, String)>,
    },
    ShortAnswer {
        accepted: Vec<String>,
    },
    TrueFalse {
        answer: String,
    },
    Numerical {
        answer: String,
        tolerance: String,
    },
}

impl Question {
    /// Dispatches on the record's declared type tag.
    ///
    /// Returns `None` for an unrecognized tag; a recognized tag whose
    /// construction fails returns the error so the caller can capture the
    /// record under the malformed key instead.
    pub fn from_record(type_tag: &str, record: &XmlValue) -> Option<Result<Self, ConvertError>> {
        match type_tag {
            "cloze" => Some(Self::cloze(record)),
            "description" => Some(Self::description(record)),
            "essay" => Some(Self::essay(record)),
            "matching" => Some(Self::matching(record)),
            "multichoice" => Some(Self::multichoice(record)),
            "numerical" => Some(Self::numerical(record)),
            "shortanswer" => Some(Self::shortanswer(record)),
            "truefalse" => Some(Self::truefalse(record)),
            _ => None,
        }
    }

    /// Captures the raw record for the unsupported and malformed buckets.
    pub fn malformed(record: &XmlValue) -> Self {
        Question {
            text: record.dump(),
            attachments: Vec::new(),
            detail: QuestionDetail::Malformed,
        }
    }

    /// Shared construction: normalized question text plus its attachments,
    /// with the inline file markers already appended.
    fn base(record: &XmlValue) -> Result<(String, Vec<Attachment>), ConvertError> {
        let container = record.get_required("questiontext")?;
        let format = TextFormat::from_tag(container.get_str("@format")?);
        let mut text = normalize(container.get_text("text")?, &format);
        let files = attachments::extract(container, &mut text)?;
        Ok((text, files))
    }

    /// Normalized text of a direct child element such as `generalfeedback`,
    /// cleaned with the child's own format tag.
    fn clean_child(record: &XmlValue, key: &str) -> Result<String, ConvertError> {
        let child = record.get_required(key)?;
        let format = TextFormat::from_tag(child.get_str("@format")?);
        Ok(normalize(child.get_text("text")?, &format))
    }

    fn description(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::Description,
        })
    }

    fn matching(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        let mut pairs = Vec::new();
        for sub in record.as_list("subquestion")? {
            let format = TextFormat::from_tag(sub.get_str("@format")?);
            let prompt = normalize(sub.get_text("text")?, &format);
            let answer = sub.get_required("answer")?;
            let matched = normalize(answer.get_text("text")?, &format);
            pairs.push((prompt, matched));
        }
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::Matching { pairs },
        })
    }

    fn multichoice(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        let mut options = Vec::new();
        for answer in record.as_list("answer")? {
            let correctness = if parse_fraction(answer)? > 0.0 {
                Correctness::Correct
            } else {
                Correctness::Incorrect
            };
            let format = TextFormat::from_tag(answer.get_str("@format")?);
            options.push((normalize(answer.get_text("text")?, &format), correctness));
        }
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::MultiChoice { options },
        })
    }

    fn essay(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        let general_feedback = Self::clean_child(record, "generalfeedback")?;
        let grader_info = Self::clean_child(record, "graderinfo")?;
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::Essay {
                general_feedback,
                grader_info,
            },
        })
    }

    fn cloze(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;

        // Square brackets collide with the [a] placeholder syntax introduced
        // below, so pre-existing ones become LaTeX bracket glyphs first.
        let mut text = escape_square_brackets(&text);

        let total = RE_CLOZE_GROUP.find_iter(&text).count();
        if total > CLOZE_SYMBOLS.len() {
            return Err(ConvertError::TooManyBlanks {
                count: total,
                max: CLOZE_SYMBOLS.len(),
            });
        }
        if total == 0 {
            return Err(ConvertError::missing("cloze answer group"));
        }

        let mut blanks = Vec::new();
        loop {
            let (range, answer) = match RE_CLOZE_GROUP.captures(&text) {
                Some(caps) => {
                    let whole = caps.get(0).unwrap();
                    let answer = cloze_answer(caps.get(1).unwrap().as_str())?;
                    (whole.start()..whole.end(), answer)
                }
                None => break,
            };
            let symbol = CLOZE_SYMBOLS[blanks.len()];
            text.replace_range(range, &format!("[{}]", symbol));
            blanks.push((symbol, answer));
        }

        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::Cloze { blanks },
        })
    }

    fn shortanswer(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        // Same collision as cloze: the exported line appends an [a] marker.
        let text = escape_square_brackets(&text);

        let mut accepted = Vec::new();
        for answer in record.as_list("answer")? {
            if parse_fraction(answer)? == 100.0 {
                let format = TextFormat::from_tag(answer.get_str("@format")?);
                accepted.push(normalize(answer.get_text("text")?, &format));
            }
        }
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::ShortAnswer { accepted },
        })
    }

    fn truefalse(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        let mut correct = None;
        for answer in record.as_list("answer")? {
            if parse_fraction(answer)? == 100.0 {
                let format = TextFormat::from_tag(answer.get_str("@format")?);
                correct = Some(normalize(answer.get_text("text")?, &format));
            }
        }
        let answer = correct.ok_or_else(|| ConvertError::missing("full-credit answer"))?;
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::TrueFalse { answer },
        })
    }

    fn numerical(record: &XmlValue) -> Result<Self, ConvertError> {
        let (text, files) = Self::base(record)?;
        let mut correct = None;
        for answer in record.as_list("answer")? {
            if parse_fraction(answer)? == 100.0 {
                let format = TextFormat::from_tag(answer.get_str("@format")?);
                correct = Some((
                    normalize(answer.get_text("text")?, &format),
                    normalize(answer.get_text("tolerance")?, &format),
                ));
            }
        }
        let (answer, tolerance) =
            correct.ok_or_else(|| ConvertError::missing("full-credit answer"))?;
        Ok(Question {
            text,
            attachments: files,
            detail: QuestionDetail::Numerical { answer, tolerance },
        })
    }

    /// Serializes to one tab-separated line of the Ultra bulk-upload format.
    /// Description and malformed entries have no structured form and export
    /// their recorded text.
    pub fn export_line(&self) -> String {
        match &self.detail {
            QuestionDetail::Description | QuestionDetail::Malformed => self.text.clone(),
            QuestionDetail::Matching { pairs } => {
                let mut line = format!("MAT\t{}", self.text);
                for (prompt, matched) in pairs {
                    line.push_str(&format!("\t{}\t{}", prompt, matched));
                }
                line
            }
            QuestionDetail::MultiChoice { options } => {
                let mut line = format!("MC\t{}", self.text);
                for (option, correctness) in options {
                    line.push_str(&format!("\t{}\t{}", option, correctness.as_str()));
                }
                line
            }
            QuestionDetail::Essay {
                general_feedback,
                grader_info,
            } => {
                let mut line = format!("ESS\t{}", self.text);
                if !general_feedback.is_empty() {
                    line.push_str(&format!("\t{}", general_feedback));
                }
                if !grader_info.is_empty() {
                    line.push_str(&format!("\t{}", grader_info));
                }
                line
            }
            QuestionDetail::Cloze { blanks } => {
                if blanks.len() > 1 {
                    let mut line = format!("FIB_PLUS\t{}", self.text);
                    for (symbol, answer) in blanks {
                        line.push_str(&format!("\t{}\t{}\t", symbol, answer));
                    }
                    line
                } else {
                    // Construction guarantees at least one blank.
                    let answer = blanks.first().map(|(_, a)| a.as_str()).unwrap_or_default();
                    format!("FIB\t{}\t{}", self.text, answer)
                }
            }
            QuestionDetail::ShortAnswer { accepted } => {
                let mut line = format!("FIB\t{} [a]", self.text);
                for answer in accepted {
                    line.push_str(&format!("\t{}", answer));
                }
                line
            }
            QuestionDetail::TrueFalse { answer } => format!("TF\t{}\t{}", self.text, answer),
            QuestionDetail::Numerical { answer, tolerance } => {
                format!("NUM\t{}\t{}\t{}", self.text, answer, tolerance)
            }
        }
    }
}

fn escape_square_brackets(text: &str) -> String {
    text.replace('[', r"$$\lbrack$$").replace(']', r"$$\rbrack$$")
}

/// The per-answer score weight, as a percentage.
fn parse_fraction(answer: &XmlValue) -> Result<f64, ConvertError> {
    answer
        .get_str("@fraction")?
        .trim()
        .parse::<f64>()
        .map_err(|_| ConvertError::mismatch("@fraction", "numeric score weight"))
}

/// Extracts the correct answer from one `{weight:type:answers}` group: the
/// answer spec is the third colon-separated segment, the correct answer the
/// text after its first `=` up to the next `~` or `#`.
fn cloze_answer(group: &str) -> Result<String, ConvertError> {
    let spec = group
        .split(':')
        .nth(2)
        .ok_or_else(|| ConvertError::mismatch("cloze answer group", "{weight:type:answers}"))?;
    let answer = spec
        .split('=')
        .nth(1)
        .ok_or_else(|| ConvertError::mismatch("cloze answer group", "'=' marking the correct answer"))?;
    let end = answer.find(['~', '#']).unwrap_or(answer.len());
    Ok(answer[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_map::parse_document;

    fn record(xml: &str) -> XmlValue {
        parse_document(xml).unwrap().get("question").unwrap().clone()
    }

    fn build(type_tag: &str, xml: &str) -> Question {
        Question::from_record(type_tag, &record(xml)).unwrap().unwrap()
    }

    #[test]
    fn test_truefalse_keeps_the_full_credit_answer() {
        let q = build(
            "truefalse",
            r#"<question type="truefalse">
                <questiontext format="html"><text>Rust is compiled.</text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>true</text></answer>
                <answer fraction="0" format="moodle_auto_format"><text>false</text></answer>
            </question>"#,
        );
        assert_eq!(q.export_line(), "TF\tRust is compiled.\ttrue");
    }

    #[test]
    fn test_truefalse_without_full_credit_answer_fails() {
        let result = Question::from_record(
            "truefalse",
            &record(
                r#"<question type="truefalse">
                    <questiontext format="html"><text>Hm.</text></questiontext>
                    <answer fraction="0" format="moodle_auto_format"><text>true</text></answer>
                </question>"#,
            ),
        )
        .unwrap();
        assert!(matches!(result, Err(ConvertError::FieldMissing { .. })));
    }

    #[test]
    fn test_multichoice_correctness_follows_positive_fraction() {
        let q = build(
            "multichoice",
            r#"<question type="multichoice">
                <questiontext format="html"><text>Pick two.</text></questiontext>
                <answer fraction="50" format="html"><text>A</text></answer>
                <answer fraction="50" format="html"><text>B</text></answer>
                <answer fraction="0" format="html"><text>C</text></answer>
                <answer fraction="-25" format="html"><text>D</text></answer>
            </question>"#,
        );
        let QuestionDetail::MultiChoice { options } = &q.detail else {
            panic!("expected a multichoice question");
        };
        let correct = options
            .iter()
            .filter(|(_, c)| *c == Correctness::Correct)
            .count();
        assert_eq!(correct, 2);
        assert_eq!(
            q.export_line(),
            "MC\tPick two.\tA\tcorrect\tB\tcorrect\tC\tincorrect\tD\tincorrect"
        );
    }

    #[test]
    fn test_shortanswer_keeps_only_exact_full_credit() {
        let q = build(
            "shortanswer",
            r#"<question type="shortanswer">
                <questiontext format="html"><text>Capital of France?</text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>Paris</text></answer>
                <answer fraction="99" format="moodle_auto_format"><text>paris</text></answer>
                <answer fraction="0" format="moodle_auto_format"><text>Lyon</text></answer>
            </question>"#,
        );
        assert_eq!(q.export_line(), "FIB\tCapital of France? [a]\tParis");
    }

    #[test]
    fn test_shortanswer_single_answer_mapping_is_wrapped() {
        let q = build(
            "shortanswer",
            r#"<question type="shortanswer">
                <questiontext format="html"><text>2 + 2?</text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>4</text></answer>
            </question>"#,
        );
        assert_eq!(q.export_line(), "FIB\t2 + 2? [a]\t4");
    }

    #[test]
    fn test_shortanswer_escapes_square_brackets() {
        let q = build(
            "shortanswer",
            r#"<question type="shortanswer">
                <questiontext format="html"><text>Interval [0, 1)?</text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>yes</text></answer>
            </question>"#,
        );
        assert_eq!(
            q.text,
            r"Interval $$\lbrack$$0, 1)?"
        );
    }

    #[test]
    fn test_numerical_takes_answer_and_tolerance() {
        let q = build(
            "numerical",
            r#"<question type="numerical">
                <questiontext format="html"><text>Approximate pi.</text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>3.14</text><tolerance>0.01</tolerance></answer>
                <answer fraction="0" format="moodle_auto_format"><text>3</text><tolerance>0</tolerance></answer>
            </question>"#,
        );
        assert_eq!(q.export_line(), "NUM\tApproximate pi.\t3.14\t0.01");
    }

    #[test]
    fn test_matching_pairs_in_order() {
        let q = build(
            "matching",
            r#"<question type="matching">
                <questiontext format="html"><text>Match them.</text></questiontext>
                <subquestion format="html"><text>France</text><answer><text>Paris</text></answer></subquestion>
                <subquestion format="html"><text>Italy</text><answer><text>Rome</text></answer></subquestion>
            </question>"#,
        );
        assert_eq!(
            q.export_line(),
            "MAT\tMatch them.\tFrance\tParis\tItaly\tRome"
        );
    }

    #[test]
    fn test_essay_skips_empty_feedback_fields() {
        let q = build(
            "essay",
            r#"<question type="essay">
                <questiontext format="html"><text>Discuss.</text></questiontext>
                <generalfeedback format="html"><text>Model answer.</text></generalfeedback>
                <graderinfo format="html"><text/></graderinfo>
            </question>"#,
        );
        assert_eq!(q.export_line(), "ESS\tDiscuss.\tModel answer.");
    }

    #[test]
    fn test_essay_with_both_fields() {
        let q = build(
            "essay",
            r#"<question type="essay">
                <questiontext format="html"><text>Discuss.</text></questiontext>
                <generalfeedback format="html"><text>Feedback.</text></generalfeedback>
                <graderinfo format="html"><text>Mark scheme.</text></graderinfo>
            </question>"#,
        );
        assert_eq!(q.export_line(), "ESS\tDiscuss.\tFeedback.\tMark scheme.");
    }

    #[test]
    fn test_cloze_single_blank_round_trip() {
        let q = build(
            "cloze",
            r#"<question type="cloze">
                <questiontext format="html"><text>Compute {1:SA:=42#wrong}</text></questiontext>
            </question>"#,
        );
        assert_eq!(q.text, "Compute [a]");
        let QuestionDetail::Cloze { blanks } = &q.detail else {
            panic!("expected a cloze question");
        };
        assert_eq!(blanks, &vec![('a', "42".to_string())]);
        assert_eq!(q.export_line(), "FIB\tCompute [a]\t42");
    }

    #[test]
    fn test_cloze_multiple_blanks_use_fib_plus() {
        let q = build(
            "cloze",
            r#"<question type="cloze">
                <questiontext format="html"><text>{1:SA:=red~blue} and {1:SA:=up#down}</text></questiontext>
            </question>"#,
        );
        assert_eq!(q.text, "[a] and [b]");
        assert_eq!(q.export_line(), "FIB_PLUS\t[a] and [b]\ta\tred\t\tb\tup\t");
    }

    #[test]
    fn test_cloze_escapes_preexisting_brackets() {
        let q = build(
            "cloze",
            r#"<question type="cloze">
                <questiontext format="html"><text>On [0,1], find {1:SA:=0}</text></questiontext>
            </question>"#,
        );
        assert_eq!(q.text, r"On $$\lbrack$$0,1$$\rbrack$$, find [a]");
    }

    #[test]
    fn test_cloze_without_blanks_fails() {
        let result = Question::from_record(
            "cloze",
            &record(
                r#"<question type="cloze">
                    <questiontext format="html"><text>No blanks here.</text></questiontext>
                </question>"#,
            ),
        )
        .unwrap();
        assert!(matches!(result, Err(ConvertError::FieldMissing { .. })));
    }

    #[test]
    fn test_cloze_with_more_than_ten_blanks_fails() {
        let groups: Vec<String> = (0..11).map(|i| format!("{{1:SA:={}}}", i)).collect();
        let xml = format!(
            r#"<question type="cloze"><questiontext format="html"><text>{}</text></questiontext></question>"#,
            groups.join(" ")
        );
        let result = Question::from_record("cloze", &record(&xml)).unwrap();
        assert!(matches!(result, Err(ConvertError::TooManyBlanks { count: 11, .. })));
    }

    #[test]
    fn test_cloze_duplicate_groups_get_distinct_placeholders() {
        let q = build(
            "cloze",
            r#"<question type="cloze">
                <questiontext format="html"><text>{1:SA:=x} twice {1:SA:=x}</text></questiontext>
            </question>"#,
        );
        assert_eq!(q.text, "[a] twice [b]");
        let QuestionDetail::Cloze { blanks } = &q.detail else {
            panic!("expected a cloze question");
        };
        assert_eq!(blanks.len(), 2);
    }

    #[test]
    fn test_cloze_malformed_group_fails() {
        let result = Question::from_record(
            "cloze",
            &record(
                r#"<question type="cloze">
                    <questiontext format="html"><text>Bad {group} here.</text></questiontext>
                </question>"#,
            ),
        )
        .unwrap();
        assert!(matches!(result, Err(ConvertError::TypeMismatch { .. })));
    }

    #[test]
    fn test_description_exports_its_text() {
        let q = build(
            "description",
            r#"<question type="description">
                <questiontext format="html"><text>Section 2 follows.</text></questiontext>
            </question>"#,
        );
        assert_eq!(q.export_line(), "Section 2 follows.");
    }

    #[test]
    fn test_unrecognized_type_dispatches_to_none() {
        let r = record(
            r#"<question type="ddimageortext">
                <questiontext format="html"><text>Drag me.</text></questiontext>
            </question>"#,
        );
        assert!(Question::from_record("ddimageortext", &r).is_none());
    }

    #[test]
    fn test_unparsable_fraction_is_a_type_mismatch() {
        let result = Question::from_record(
            "multichoice",
            &record(
                r#"<question type="multichoice">
                    <questiontext format="html"><text>Q</text></questiontext>
                    <answer fraction="lots" format="html"><text>A</text></answer>
                </question>"#,
            ),
        )
        .unwrap();
        assert!(matches!(result, Err(ConvertError::TypeMismatch { .. })));
    }

    #[test]
    fn test_question_text_is_normalized() {
        let q = build(
            "truefalse",
            r#"<question type="truefalse">
                <questiontext format="html"><text><![CDATA[<p dir="ltr">Is $x$ real?</p>]]></text></questiontext>
                <answer fraction="100" format="moodle_auto_format"><text>true</text></answer>
            </question>"#,
        );
        assert_eq!(q.text, "<p>Is $$x$$ real?</p>");
    }
}
