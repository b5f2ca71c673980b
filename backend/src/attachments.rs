//! Embedded file attachments.
//!
//! A question can carry multiple attached files, and the export gives no
//! indication of where each file is linked in the question body. Every
//! descriptor is therefore referenced inline by name at the end of the
//! question text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ConvertError;
use crate::xml_map::XmlValue;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub content: Vec<u8>,
}

/// Collects the file descriptors under a question-text container and
/// appends an inline ` [[ linked file <name> ]]` marker to the text for
/// each descriptor, in order. Base64 payloads are decoded strictly; other
/// encodings keep their marker but contribute no file content.
pub fn extract(container: &XmlValue, text: &mut String) -> Result<Vec<Attachment>, ConvertError> {
    let mut files = Vec::new();

    if !container.has("file") {
        return Ok(files);
    }

    for descriptor in container.as_list("file")? {
        let name = descriptor.get_str("@name")?;

        if descriptor.get_str("@encoding")? == "base64" {
            let payload = descriptor.get_str("#text")?;
            let content = STANDARD
                .decode(payload)
                .map_err(|source| ConvertError::DecodeError {
                    name: name.to_string(),
                    source,
                })?;
            files.push(Attachment {
                name: name.to_string(),
                content,
            });
        }

        text.push_str(&format!(" [[ linked file {} ]]", name));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_map::parse_document;

    fn container(xml: &str) -> XmlValue {
        parse_document(xml)
            .unwrap()
            .get("questiontext")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_no_file_descriptors() {
        let qt = container("<questiontext><text>Hi</text></questiontext>");
        let mut text = "Hi".to_string();
        let files = extract(&qt, &mut text).unwrap();
        assert!(files.is_empty());
        assert_eq!(text, "Hi");
    }

    #[test]
    fn test_base64_payload_round_trip() {
        let payload = STANDARD.encode(b"\x89PNG fake bytes");
        let xml = format!(
            r#"<questiontext><text>See diagram.</text><file name="diagram.png" encoding="base64">{}</file></questiontext>"#,
            payload
        );
        let qt = container(&xml);

        let mut text = "See diagram.".to_string();
        let files = extract(&qt, &mut text).unwrap();

        assert_eq!(text, "See diagram. [[ linked file diagram.png ]]");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "diagram.png");
        assert_eq!(files[0].content, b"\x89PNG fake bytes");
    }

    #[test]
    fn test_multiple_descriptors_keep_order() {
        let xml = r#"<questiontext><text>Q</text>
            <file name="a.png" encoding="base64">QQ==</file>
            <file name="b.png" encoding="base64">Qg==</file>
        </questiontext>"#;
        let qt = container(xml);

        let mut text = "Q".to_string();
        let files = extract(&qt, &mut text).unwrap();

        assert_eq!(text, "Q [[ linked file a.png ]] [[ linked file b.png ]]");
        assert_eq!(files[0].content, b"A");
        assert_eq!(files[1].content, b"B");
    }

    #[test]
    fn test_unknown_encoding_keeps_marker_without_content() {
        let xml = r#"<questiontext><text>Q</text><file name="x.bin" encoding="uuencode">abc</file></questiontext>"#;
        let qt = container(xml);

        let mut text = "Q".to_string();
        let files = extract(&qt, &mut text).unwrap();

        assert!(files.is_empty());
        assert_eq!(text, "Q [[ linked file x.bin ]]");
    }

    #[test]
    fn test_invalid_base64_is_a_decode_error() {
        let xml = r#"<questiontext><text>Q</text><file name="x.png" encoding="base64">not base64!!</file></questiontext>"#;
        let qt = container(xml);

        let mut text = "Q".to_string();
        let err = extract(&qt, &mut text).unwrap_err();
        assert!(matches!(err, ConvertError::DecodeError { .. }));
    }

    #[test]
    fn test_descriptor_without_name_is_field_missing() {
        let xml = r#"<questiontext><text>Q</text><file encoding="base64">QQ==</file></questiontext>"#;
        let qt = container(xml);

        let mut text = "Q".to_string();
        let err = extract(&qt, &mut text).unwrap_err();
        assert!(matches!(err, ConvertError::FieldMissing { .. }));
    }
}
