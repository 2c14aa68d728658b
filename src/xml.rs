//! XML rendering of a preprocessed document for prompt construction.
//!
//! ```text
//! <document>
//!   <metadata>
//!     <type>pdf</type> <format>.pdf</format> <pages>5</pages>
//!     <quality>0.60</quality> <preprocessing>text_cleaning, ...</preprocessing>
//!   </metadata>
//!   <content><raw_text>...</raw_text></content>
//!   <structured_data>{ intermediate as JSON }</structured_data>
//! </document>
//! ```
//!
//! All text is escaped by the writer, so document content containing `<` or
//! `&` cannot break the envelope.

use crate::error::PreprocessError;
use crate::output::{DocumentMetadata, Intermediate};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

fn xml_err(e: impl std::fmt::Display) -> PreprocessError {
    PreprocessError::Serialization(e.to_string())
}

/// Render text, metadata and the intermediate record as one XML document.
pub fn render_xml(
    text: &str,
    metadata: &DocumentMetadata,
    intermediate: &Intermediate,
) -> Result<String, PreprocessError> {
    let structured = serde_json::to_string_pretty(intermediate).map_err(xml_err)?;
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    start(&mut writer, "document")?;
    start(&mut writer, "metadata")?;
    leaf(&mut writer, "type", metadata.document_type.as_str())?;
    leaf(&mut writer, "format", &metadata.file_format)?;
    leaf(&mut writer, "pages", &metadata.page_count.to_string())?;
    leaf(&mut writer, "quality", &format!("{:.2}", metadata.estimated_quality))?;
    leaf(&mut writer, "preprocessing", &metadata.preprocessing_applied.join(", "))?;
    end(&mut writer, "metadata")?;

    start(&mut writer, "content")?;
    leaf(&mut writer, "raw_text", text)?;
    end(&mut writer, "content")?;

    leaf(&mut writer, "structured_data", &structured)?;
    end(&mut writer, "document")?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn start(w: &mut XmlWriter, name: &str) -> Result<(), PreprocessError> {
    w.write_event(Event::Start(BytesStart::new(name))).map_err(xml_err)
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), PreprocessError> {
    w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

fn leaf(w: &mut XmlWriter, name: &str, value: &str) -> Result<(), PreprocessError> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(value))).map_err(xml_err)?;
    end(w, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{
        DocumentType, ImageIntermediate, ImageProperties, LayoutInfo, MetadataBuilder,
    };
    use quick_xml::Reader;

    fn sample() -> (DocumentMetadata, Intermediate) {
        let mut meta = MetadataBuilder::new(DocumentType::Image, ".png");
        meta.page_count(1).quality(0.4567).record("image_enhancement").record("text_cleaning");
        let intermediate = Intermediate::Image(ImageIntermediate {
            image_properties: ImageProperties {
                width: 10,
                height: 5,
                mode: "RGB".into(),
                format: Some("PNG".into()),
                aspect_ratio: 2.0,
                estimated_dpi: (72, 72),
            },
            layout_detection: LayoutInfo::unknown(false),
            ocr_confidence: 0.4567,
            extracted_text: "Total <due> & paid".into(),
            ocr_error: None,
        });
        (meta.build(), intermediate)
    }

    #[test]
    fn renders_metadata_and_escapes_text() {
        let (meta, intermediate) = sample();
        let xml = render_xml("Total <due> & paid", &meta, &intermediate).unwrap();
        assert!(xml.starts_with("<document>"));
        assert!(xml.contains("<type>image</type>"));
        assert!(xml.contains("<format>.png</format>"));
        assert!(xml.contains("<quality>0.46</quality>"));
        assert!(xml.contains("<preprocessing>image_enhancement, text_cleaning</preprocessing>"));
        assert!(xml.contains("Total &lt;due&gt; &amp; paid"));
        assert!(!xml.contains("<due>"));
    }

    #[test]
    fn output_is_well_formed() {
        let (meta, intermediate) = sample();
        let xml = render_xml("text", &meta, &intermediate).unwrap();

        let mut reader = Reader::from_str(&xml);
        let mut depth = 0i32;
        let mut names = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => {
                    depth += 1;
                    names.push(String::from_utf8(e.name().as_ref().to_vec()).unwrap());
                }
                Event::End(_) => depth -= 1,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(depth, 0);
        assert_eq!(
            names,
            vec![
                "document",
                "metadata",
                "type",
                "format",
                "pages",
                "quality",
                "preprocessing",
                "content",
                "raw_text",
                "structured_data"
            ]
        );
    }
}
