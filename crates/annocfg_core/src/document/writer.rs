//! Serialization of document trees

use quick_xml::escape::escape;

use super::{Document, DocumentNode, XmlNode};

pub(super) fn write_verbatim(doc: &Document) -> String {
    let mut out = String::new();
    if doc.has_bom() {
        out.push('\u{feff}');
    }
    for child in doc.top().children() {
        write_node(&mut out, child);
    }
    out
}

fn write_node(out: &mut String, node: &XmlNode) {
    match node {
        XmlNode::Element(e) => write_element(out, e),
        XmlNode::Text(t) => out.push_str(t),
        XmlNode::CData(t) => {
            out.push_str("<![CDATA[");
            out.push_str(t);
            out.push_str("]]>");
        }
        XmlNode::Comment(t) => {
            out.push_str("<!--");
            out.push_str(t);
            out.push_str("-->");
        }
        XmlNode::Decl(t) | XmlNode::ProcessingInstruction(t) => {
            out.push_str("<?");
            out.push_str(t);
            out.push_str("?>");
        }
        XmlNode::DocType(t) => {
            out.push_str("<!");
            out.push_str(t);
            out.push('>');
        }
        XmlNode::Slot => {}
    }
}

fn write_element(out: &mut String, e: &DocumentNode) {
    let empty = e.children().iter().all(|c| matches!(c, XmlNode::Slot));
    out.push('<');
    match e.raw_start() {
        Some(raw) => {
            out.push_str(raw);
            if empty && e.is_self_closing() {
                out.push_str("/>");
                return;
            }
        }
        None => {
            write_name_and_attributes(out, e);
            if empty && e.is_self_closing() {
                out.push_str(" />");
                return;
            }
        }
    }
    out.push('>');
    for child in e.children() {
        write_node(out, child);
    }
    out.push_str("</");
    out.push_str(e.name());
    out.push('>');
}

fn write_name_and_attributes(out: &mut String, e: &DocumentNode) {
    out.push_str(e.name());
    for attr in e.attributes() {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape(attr.value.as_str()));
        out.push('"');
    }
}

pub(super) fn write_pretty(doc: &Document, unit: &str) -> String {
    let mut out = String::new();
    if doc.has_bom() {
        out.push('\u{feff}');
    }
    for child in doc.top().children() {
        if child.is_blank() || matches!(child, XmlNode::Slot) {
            continue;
        }
        write_pretty_node(&mut out, child, 0, unit);
        out.push('\n');
    }
    out
}

fn write_pretty_node(out: &mut String, node: &XmlNode, depth: usize, unit: &str) {
    out.push_str(&unit.repeat(depth));
    match node {
        XmlNode::Element(e) => write_pretty_element(out, e, depth, unit),
        other => write_node(out, other),
    }
}

fn write_pretty_element(out: &mut String, e: &DocumentNode, depth: usize, unit: &str) {
    let children: Vec<&XmlNode> = e
        .children()
        .iter()
        .filter(|c| !c.is_blank() && !matches!(c, XmlNode::Slot))
        .collect();

    out.push('<');
    write_name_and_attributes(out, e);
    if children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');

    let nested = children
        .iter()
        .any(|c| matches!(c, XmlNode::Element(_) | XmlNode::Comment(_)));
    if nested {
        for child in &children {
            out.push('\n');
            write_pretty_node(out, child, depth + 1, unit);
        }
        out.push('\n');
        out.push_str(&unit.repeat(depth));
    } else {
        for child in &children {
            write_node(out, child);
        }
    }
    out.push_str("</");
    out.push_str(e.name());
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_layout() {
        let root = DocumentNode::new("A")
            .with_field("B", "1")
            .with_child(DocumentNode::new("C").with_field("D", ""));
        let doc = Document::from_elements(vec![root, DocumentNode::with_text("E", "2")]);
        assert_eq!(
            doc.to_pretty_string(" "),
            "<A>\n <B>1</B>\n <C>\n  <D />\n </C>\n</A>\n<E>2</E>\n"
        );
    }

    #[test]
    fn test_pretty_ignores_source_whitespace() {
        let doc = Document::parse("<A>\n\t\t<B>x</B>\n</A>").unwrap();
        assert_eq!(doc.to_pretty_string("  "), "<A>\n  <B>x</B>\n</A>\n");
    }

    #[test]
    fn test_generated_empty_element() {
        let doc = Document::from_root(DocumentNode::new("Empty"));
        assert_eq!(doc.to_xml_string(), "<Empty />");
    }

    #[test]
    fn test_slots_are_invisible() {
        let mut doc = Document::parse("<A><B/></A>").unwrap();
        doc.root_mut().unwrap().promote(0).unwrap();
        assert_eq!(doc.to_xml_string(), "<A></A>");
    }
}
