//! Mapping document front-end built on quick-xml.

use crate::error::{AuditorError, Result};
use crate::models::{MappingDocument, MappingStatement, StatementKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Byte offset to 1-based line lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

/// Statement currently being collected.
struct OpenStatement {
    id: String,
    kind: StatementKind,
    line: usize,
    text: String,
    depth: usize,
}

fn attribute(path: &Path, element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| AuditorError::parse(path, format!("bad attribute: {}", e)))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| AuditorError::parse(path, format!("bad attribute value: {}", e)))
    })
    .transpose()
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Parse a mapping document.
///
/// Statement text is the concatenation of all text and CDATA below the statement
/// element, nested dynamic-SQL elements included. Only statements inside a
/// `<mapper>` element are collected; other XML files come back empty.
pub fn parse_mapping_document(path: &Path, source: &str) -> Result<MappingDocument> {
    let lines = LineIndex::new(source);
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);

    let mut doc = MappingDocument {
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut in_mapper = false;
    let mut open_elements = 0usize;
    let mut current: Option<OpenStatement> = None;
    let mut buf = Vec::new();

    loop {
        let offset = reader.buffer_position() as usize;
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            AuditorError::parse(
                path,
                format!("{} (line {})", e, lines.line_of(reader.buffer_position() as usize)),
            )
        })?;

        match event {
            Event::Start(ref e) => {
                open_elements += 1;
                let name = local_name(e);

                if let Some(stmt) = current.as_mut() {
                    stmt.depth += 1;
                } else if name == "mapper" && !in_mapper {
                    in_mapper = true;
                    doc.has_mapper_root = true;
                    doc.namespace = attribute(path, e, "namespace")?;
                } else if let Some(kind) = StatementKind::from_tag(&name).filter(|_| in_mapper) {
                    current = Some(OpenStatement {
                        id: attribute(path, e, "id")?.unwrap_or_default(),
                        kind,
                        line: lines.line_of(offset),
                        text: String::new(),
                        depth: 1,
                    });
                }
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                if current.is_some() {
                    // `<include/>` and friends inside a statement carry no text
                } else if name == "mapper" && !in_mapper {
                    doc.has_mapper_root = true;
                    doc.namespace = attribute(path, e, "namespace")?;
                } else if let Some(kind) = StatementKind::from_tag(&name).filter(|_| in_mapper) {
                    doc.statements.push(MappingStatement {
                        namespace: doc.namespace.clone().unwrap_or_default(),
                        id: attribute(path, e, "id")?.unwrap_or_default(),
                        kind,
                        text: String::new(),
                        line: lines.line_of(offset),
                    });
                }
            }
            Event::End(ref e) => {
                open_elements = open_elements.saturating_sub(1);
                if let Some(stmt) = current.as_mut() {
                    stmt.depth -= 1;
                    if stmt.depth == 0 {
                        if let Some(stmt) = current.take() {
                            doc.statements.push(MappingStatement {
                                namespace: doc.namespace.clone().unwrap_or_default(),
                                id: stmt.id,
                                kind: stmt.kind,
                                text: stmt.text,
                                line: stmt.line,
                            });
                        }
                    }
                } else if e.local_name().as_ref() == b"mapper" {
                    in_mapper = false;
                }
            }
            Event::Text(ref t) => {
                if let Some(stmt) = current.as_mut() {
                    match t.unescape() {
                        Ok(text) => stmt.text.push_str(&text),
                        Err(_) => stmt.text.push_str(&String::from_utf8_lossy(t)),
                    }
                }
            }
            Event::CData(ref c) => {
                if let Some(stmt) = current.as_mut() {
                    stmt.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if open_elements > 0 {
        return Err(AuditorError::parse(path, "unexpected end of document"));
    }

    Ok(doc)
}
