//! Minimal `.docx` template editing.
//!
//! A template is a zip package; only `word/document.xml` is rewritten. The
//! operations are deliberately narrow: append rows to the first table, replace
//! the tail of one paragraph found by its text, substitute a placeholder, and
//! serialize back with every other part copied untouched.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const TABLE: &str = "w:tbl";
const PARAGRAPH: &str = "w:p";
const RUN: &str = "w:r";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("template is malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn malformed(reason: impl ToString) -> TemplateError {
    TemplateError::Malformed(reason.to_string())
}

/// One table cell. Numbers are right-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn number(value: impl Into<String>) -> Self {
        Cell::Number(value.into())
    }

    fn to_xml(&self) -> String {
        let (value, justify) = match self {
            Cell::Text(v) => (v, ""),
            Cell::Number(v) => (v, r#"<w:pPr><w:jc w:val="right"/></w:pPr>"#),
        };
        format!(
            r#"<w:tc><w:p>{justify}<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
            escape(value.as_str())
        )
    }
}

#[derive(Debug, Clone)]
pub struct DocxTemplate {
    package: Vec<u8>,
    document: String,
}

impl DocxTemplate {
    /// Read a template from disk. Blocking.
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TemplateError::Missing(path.to_path_buf()),
            _ => TemplateError::Io(e),
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(package: Vec<u8>) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(package.as_slice())).map_err(malformed)?;
        let mut document = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| malformed(format!("{DOCUMENT_PART} is missing")))?
            .read_to_string(&mut document)
            .map_err(malformed)?;
        drop(archive);

        Ok(Self { package, document })
    }

    /// Append rows at the end of the first table in the body.
    pub fn append_rows(&mut self, rows: &[Vec<Cell>]) -> Result<(), TemplateError> {
        let open = find_open_tag(&self.document, TABLE, 0)
            .ok_or_else(|| malformed("document has no table"))?;
        let close = find_matching_close(&self.document, TABLE, open)
            .ok_or_else(|| malformed("table is not closed"))?;

        let mut xml = String::new();
        for row in rows {
            xml.push_str("<w:tr>");
            for cell in row {
                xml.push_str(&cell.to_xml());
            }
            xml.push_str("</w:tr>");
        }
        self.document.insert_str(close, &xml);
        Ok(())
    }

    /// Find the first paragraph whose text contains `marker` and replace
    /// everything after the marker with `" " + tail`. Paragraph and first-run
    /// formatting are kept. Returns `false` when no paragraph matches.
    pub fn replace_paragraph_tail(&mut self, marker: &str, tail: &str) -> Result<bool, TemplateError> {
        let close_tag = format!("</{PARAGRAPH}>");
        let mut from = 0;

        while let Some(start) = find_open_tag(&self.document, PARAGRAPH, from) {
            let Some(tag_end) = self.document[start..].find('>').map(|i| start + i) else {
                return Err(malformed("unterminated paragraph tag"));
            };
            if self.document[..tag_end].ends_with('/') {
                from = tag_end + 1;
                continue;
            }
            let end = self.document[tag_end..]
                .find(&close_tag)
                .map(|i| tag_end + i + close_tag.len())
                .ok_or_else(|| malformed("paragraph is not closed"))?;

            let paragraph = &self.document[start..end];
            let text = paragraph_text(paragraph)?;
            if let Some(at) = text.find(marker) {
                let kept = &text[..at + marker.len()];
                let rebuilt = rebuild_paragraph(paragraph, &format!("{kept} {tail}"));
                self.document.replace_range(start..end, &rebuilt);
                return Ok(true);
            }
            from = end;
        }
        Ok(false)
    }

    /// Substitute every occurrence of `placeholder` with escaped `value`.
    pub fn replace_placeholder(&mut self, placeholder: &str, value: &str) -> bool {
        if !self.document.contains(placeholder) {
            return false;
        }
        self.document = self.document.replace(placeholder, &escape(value));
        true
    }

    pub fn document_xml(&self) -> &str {
        &self.document
    }

    /// Serialize the package with the edited body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        let mut archive =
            ZipArchive::new(Cursor::new(self.package.as_slice())).map_err(malformed)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(malformed)?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                writer.start_file(DOCUMENT_PART, options).map_err(io::Error::other)?;
                writer.write_all(self.document.as_bytes())?;
            } else {
                writer.raw_copy_file(entry).map_err(io::Error::other)?;
            }
        }

        let cursor = writer.finish().map_err(io::Error::other)?;
        Ok(cursor.into_inner())
    }

    /// A blank package: centered `title` paragraph, one bordered table with a
    /// bold header row, and an optional closing paragraph.
    pub fn scaffold(title: &str, headers: &[&str], closing: Option<&str>) -> Result<Vec<u8>, TemplateError> {
        let mut body = format!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>{}</w:t></w:r></w:p>"#,
            escape(title)
        );
        body.push_str(concat!(
            "<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/><w:tblBorders>",
            "<w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "</w:tblBorders></w:tblPr><w:tblGrid>"
        ));
        for _ in headers {
            body.push_str(r#"<w:gridCol w:w="1000"/>"#);
        }
        body.push_str("</w:tblGrid><w:tr>");
        for header in headers {
            body.push_str(&format!(
                r#"<w:tc><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{}</w:t></w:r></w:p></w:tc>"#,
                escape(*header)
            ));
        }
        body.push_str("</w:tr></w:tbl>");
        if let Some(closing) = closing {
            body.push_str(&format!(
                r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                escape(closing)
            ));
        }

        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                "<w:body>{}<w:sectPr/></w:body></w:document>"
            ),
            body
        );

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            (DOCUMENT_PART, document.as_str()),
        ];
        for (name, content) in parts {
            writer.start_file(name, options).map_err(io::Error::other)?;
            writer.write_all(content.as_bytes())?;
        }
        Ok(writer.finish().map_err(io::Error::other)?.into_inner())
    }
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    "</Types>"
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    "</Relationships>"
);

/// Position of `<{name}` followed by `>`, `/` or whitespace, so `w:tbl` never
/// matches `w:tblPr` and `w:p` never matches `w:pPr`.
fn find_open_tag(xml: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("<{name}");
    let mut pos = from;
    while let Some(i) = xml.get(pos..)?.find(&needle) {
        let at = pos + i;
        match xml[at + needle.len()..].chars().next() {
            Some('>' | '/') => return Some(at),
            Some(c) if c.is_whitespace() => return Some(at),
            _ => pos = at + needle.len(),
        }
    }
    None
}

/// Byte offset of the `</{name}>` that closes the element opened at `open`.
fn find_matching_close(xml: &str, name: &str, open: usize) -> Option<usize> {
    let close = format!("</{name}>");
    let mut depth = 0usize;
    let mut pos = open + 1;
    loop {
        let next_close = xml[pos..].find(&close).map(|i| pos + i)?;
        match find_open_tag(xml, name, pos) {
            Some(next_open) if next_open < next_close => {
                depth += 1;
                pos = next_open + 1;
            }
            _ if depth == 0 => return Some(next_close),
            _ => {
                depth -= 1;
                pos = next_close + close.len();
            }
        }
    }
}

/// Concatenated `<w:t>` text of one paragraph.
fn paragraph_text(paragraph: &str) -> Result<String, TemplateError> {
    let mut reader = Reader::from_str(paragraph);
    let mut in_text = false;
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Text(t) if in_text => text.push_str(&t.unescape().map_err(malformed)?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

/// Same opening tag, `w:pPr` and first-run `w:rPr`, single run with `text`.
fn rebuild_paragraph(paragraph: &str, text: &str) -> String {
    let open_end = paragraph.find('>').map_or(paragraph.len(), |i| i + 1);
    let open_tag = &paragraph[..open_end];
    let rest = &paragraph[open_end..];

    let (properties, after_properties) = element_slice(rest, "w:pPr")
        .filter(|(start, _)| rest[..*start].trim().is_empty())
        .map_or(("", rest), |(start, end)| (&rest[start..end], &rest[end..]));

    let run_properties = find_open_tag(after_properties, RUN, 0)
        .and_then(|run_start| {
            let run = &after_properties[run_start..];
            let run_end = run.find("</w:r>").unwrap_or(run.len());
            element_slice(&run[..run_end], "w:rPr").map(|(s, e)| &run[s..e])
        })
        .unwrap_or("");

    format!(
        r#"{open_tag}{properties}<w:r>{run_properties}<w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(text)
    )
}

/// Start and end of the first `<{name}>…</{name}>` or `<{name}/>` element.
fn element_slice(xml: &str, name: &str) -> Option<(usize, usize)> {
    let start = find_open_tag(xml, name, 0)?;
    let tag_end = start + xml[start..].find('>')?;
    if xml[..tag_end].ends_with('/') {
        return Some((start, tag_end + 1));
    }
    let close = format!("</{name}>");
    let end = tag_end + xml[tag_end..].find(&close)? + close.len();
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocxTemplate {
        let bytes = DocxTemplate::scaffold("{{title}}", &["No", "Name"], Some("Total:")).unwrap();
        DocxTemplate::from_bytes(bytes).unwrap()
    }

    #[test]
    fn rows_land_inside_the_first_table() {
        let mut doc = sample();
        doc.append_rows(&[vec![Cell::number("1"), Cell::text("Kobzar & Co")]])
            .unwrap();

        let xml = doc.document_xml();
        let row = xml.find("Kobzar &amp; Co").unwrap();
        let table_end = xml.find("</w:tbl>").unwrap();
        assert!(row < table_end);
        assert!(xml.contains(r#"<w:jc w:val="right"/></w:pPr><w:r><w:t xml:space="preserve">1<"#));
    }

    #[test]
    fn nested_tables_are_skipped_when_closing() {
        let xml = "<w:tbl><w:tblPr/><w:tr><w:tc><w:tbl><w:tr/></w:tbl></w:tc></w:tr></w:tbl>";
        let open = find_open_tag(xml, TABLE, 0).unwrap();
        let close = find_matching_close(xml, TABLE, open).unwrap();
        assert_eq!(close, xml.len() - "</w:tbl>".len());
    }

    #[test]
    fn tag_search_ignores_longer_names() {
        assert_eq!(find_open_tag("<w:pPr/><w:p>", PARAGRAPH, 0), Some(8));
        assert_eq!(find_open_tag("<w:tblPr><w:tblGrid>", TABLE, 0), None);
        assert_eq!(find_open_tag(r#"<w:p w:rsidR="1">"#, PARAGRAPH, 0), Some(0));
    }

    #[test]
    fn paragraph_tail_is_replaced_and_formatting_kept() {
        let mut doc = DocxTemplate {
            package: Vec::new(),
            document: concat!(
                r#"<w:body><w:p><w:r><w:t>Intro</w:t></w:r></w:p>"#,
                r#"<w:p w:rsidR="00A1"><w:pPr><w:jc w:val="left"/><w:rPr><w:i/></w:rPr></w:pPr>"#,
                r#"<w:r><w:rPr><w:b/></w:rPr><w:t>Всього </w:t></w:r>"#,
                r#"<w:r><w:t>на суму</w:t></w:r><w:r><w:t xml:space="preserve"> ____ грн</w:t></w:r></w:p></w:body>"#
            )
            .to_string(),
        };

        assert!(doc.replace_paragraph_tail("Всього на суму", "12,50").unwrap());
        assert_eq!(
            doc.document_xml(),
            concat!(
                r#"<w:body><w:p><w:r><w:t>Intro</w:t></w:r></w:p>"#,
                r#"<w:p w:rsidR="00A1"><w:pPr><w:jc w:val="left"/><w:rPr><w:i/></w:rPr></w:pPr>"#,
                r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Всього на суму 12,50</w:t></w:r></w:p></w:body>"#
            )
        );
    }

    #[test]
    fn missing_marker_leaves_document_alone() {
        let mut doc = sample();
        let before = doc.document_xml().to_string();
        assert!(!doc.replace_paragraph_tail("Grand total", "1,00").unwrap());
        assert_eq!(doc.document_xml(), before);
    }

    #[test]
    fn placeholder_is_escaped() {
        let mut doc = sample();
        assert!(doc.replace_placeholder("{{title}}", "Act <1>"));
        assert!(doc.document_xml().contains("Act &lt;1&gt;"));
        assert!(!doc.replace_placeholder("{{title}}", "again"));
    }

    #[test]
    fn serialized_package_keeps_other_parts() {
        let mut doc = sample();
        doc.append_rows(&[vec![Cell::text("a"), Cell::text("b")]]).unwrap();
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["[Content_Types].xml", "_rels/.rels", DOCUMENT_PART]);

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert_eq!(xml, doc.document_xml());
    }

    #[test]
    fn broken_inputs_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DocxTemplate::open(&dir.path().join("absent.docx")).unwrap_err();
        assert!(matches!(missing, TemplateError::Missing(_)));

        let not_zip = DocxTemplate::from_bytes(b"plain text".to_vec()).unwrap_err();
        assert!(matches!(not_zip, TemplateError::Malformed(_)));

        let mut table_less = sample();
        table_less.document = "<w:body><w:p/></w:body>".to_string();
        assert!(matches!(
            table_less.append_rows(&[vec![Cell::text("x")]]),
            Err(TemplateError::Malformed(_))
        ));
    }
}
