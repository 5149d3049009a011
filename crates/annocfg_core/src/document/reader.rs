//! Event-driven parser building a lossless [`Document`]

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{is_blank, Attribute, Document, DocumentNode, XmlNode};
use crate::error::FormatError;

const BOM: char = '\u{feff}';

pub(super) fn parse(text: &str, fragment: bool) -> Result<Document, FormatError> {
    let (bom, body) = match text.strip_prefix(BOM) {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(false);

    let mut top = DocumentNode::default();
    // Open elements with the offset of their start tag
    let mut stack: Vec<(DocumentNode, usize)> = Vec::new();

    loop {
        let offset = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| FormatError::at_offset(body, reader.error_position() as usize, e.to_string()))?;

        let node = match event {
            Event::Start(start) => {
                let element = element_from_start(&start, body, offset, false)?;
                stack.push((element, offset));
                continue;
            }
            Event::End(_) => match stack.pop() {
                Some((element, _)) => XmlNode::Element(element),
                None => {
                    return Err(FormatError::at_offset(body, offset, "unexpected end tag"));
                }
            },
            Event::Empty(start) => XmlNode::Element(element_from_start(&start, body, offset, true)?),
            Event::Text(t) => XmlNode::Text(utf8(&t, body, offset)?),
            Event::CData(t) => XmlNode::CData(utf8(&t, body, offset)?),
            Event::Comment(t) => XmlNode::Comment(utf8(&t, body, offset)?),
            Event::Decl(d) => XmlNode::Decl(utf8(&d, body, offset)?),
            Event::PI(p) => XmlNode::ProcessingInstruction(utf8(&p, body, offset)?),
            // The event drops the keyword and its trailing whitespace; keep the source text
            Event::DocType(_) => {
                let end = reader.buffer_position() as usize;
                let raw = body.get(offset..end).unwrap_or_default();
                let inner = raw
                    .strip_prefix("<!")
                    .and_then(|r| r.strip_suffix('>'))
                    .unwrap_or(raw);
                XmlNode::DocType(inner.to_string())
            }
            Event::Eof => break,
        };

        match stack.last_mut() {
            Some((parent, _)) => parent.children.push(node),
            None => {
                if let XmlNode::Text(t) = &node {
                    if !is_blank(t) {
                        return Err(FormatError::at_offset(
                            body,
                            offset,
                            "text outside of the root element",
                        ));
                    }
                }
                top.children.push(node);
            }
        }
    }

    if let Some((open, offset)) = stack.last() {
        return Err(FormatError::at_offset(
            body,
            *offset,
            format!("element <{}> is never closed", open.name),
        ));
    }

    let roots = top.element_count();
    if !fragment && roots != 1 {
        let message = if roots == 0 {
            "document has no root element".to_string()
        } else {
            format!("document has {} root elements, expected one", roots)
        };
        return Err(FormatError::at_offset(body, body.len(), message));
    }

    Ok(Document::from_parts(top, bom, fragment))
}

fn element_from_start(
    start: &BytesStart<'_>,
    body: &str,
    offset: usize,
    self_closing: bool,
) -> Result<DocumentNode, FormatError> {
    let name = utf8(start.name().as_ref(), body, offset)?;
    let raw = utf8(start, body, offset)?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::at_offset(body, offset, e.to_string()))?;
        let key = utf8(attr.key.as_ref(), body, offset)?;
        let value = attr
            .unescape_value()
            .map_err(|e| FormatError::at_offset(body, offset, e.to_string()))?;
        attributes.push(Attribute {
            name: key,
            value: value.into_owned(),
        });
    }

    Ok(DocumentNode {
        name,
        attributes,
        children: Vec::new(),
        raw_start: Some(raw),
        self_closing,
    })
}

fn utf8(bytes: &[u8], body: &str, offset: usize) -> Result<String, FormatError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| FormatError::at_offset(body, offset, e.to_string()))
}
