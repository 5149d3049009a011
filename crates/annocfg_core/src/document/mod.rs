//! Lossless document tree
//!
//! A [`Document`] keeps every byte of the text it was parsed from: whitespace,
//! comments, the declaration, entity escapes and the exact spelling of each
//! start tag. Writing an untouched document gives back the input verbatim.
//!
//! Elements that the scene mapper turns into scene nodes are taken out of
//! their parent and replaced by [`XmlNode::Slot`]; export fills the slots
//! again in child order.

mod path;
mod reader;
mod value;
mod writer;

use std::borrow::Cow;

use quick_xml::escape::{partial_escape, unescape};

use crate::error::FormatError;

pub use path::{QueryPath, Segment};
pub use value::{format_float, Value};

/// One child of an element
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    Element(DocumentNode),
    /// Character data exactly as written (still escaped)
    Text(String),
    CData(String),
    Comment(String),
    /// `<?xml ...?>` body
    Decl(String),
    ProcessingInstruction(String),
    /// Everything between `<!` and `>`, keyword included
    DocType(String),
    /// Position of an element promoted into a scene node
    Slot,
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&DocumentNode> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut DocumentNode> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whitespace-only text
    pub fn is_blank(&self) -> bool {
        matches!(self, XmlNode::Text(t) if is_blank(t))
    }
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// An attribute with its unescaped value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Indentation used when new elements are inserted
///
/// `depth` is the nesting level that children of the node being edited
/// sit at. A compact indent inserts no whitespace at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indent {
    unit: Option<String>,
    depth: usize,
}

impl Indent {
    pub fn new(unit: impl Into<String>, depth: usize) -> Self {
        Self {
            unit: Some(unit.into()),
            depth,
        }
    }

    pub fn compact() -> Self {
        Self { unit: None, depth: 0 }
    }

    /// Indent for the children of a child
    pub fn nested(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            depth: self.depth + 1,
        }
    }

    /// Indent `levels` deeper
    pub fn deeper(&self, levels: usize) -> Self {
        Self {
            unit: self.unit.clone(),
            depth: self.depth + levels,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn line(&self, depth: usize) -> Option<String> {
        self.unit
            .as_ref()
            .map(|unit| format!("\n{}", unit.repeat(depth)))
    }
}

/// One element with its attributes and children
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentNode {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<XmlNode>,
    /// Start tag body as written in the source; dropped once attributes change
    raw_start: Option<String>,
    self_closing: bool,
}

impl DocumentNode {
    /// A new, empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            raw_start: None,
            self_closing: true,
        }
    }

    /// A new element holding `text`
    pub fn with_text(name: impl Into<String>, text: &str) -> Self {
        let mut node = Self::new(name);
        node.set_text(text);
        node
    }

    /// Builder: append a child element without any indentation
    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: append a text field `<name>text</name>`
    pub fn with_field(self, name: &str, text: &str) -> Self {
        self.with_child(DocumentNode::with_text(name, text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.raw_start = None;
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
        self.raw_start = None;
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    /// Child elements in order
    pub fn elements(&self) -> impl Iterator<Item = &DocumentNode> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut DocumentNode> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    /// True if this element has no child elements
    pub fn is_leaf(&self) -> bool {
        !self
            .children
            .iter()
            .any(|c| matches!(c, XmlNode::Element(_) | XmlNode::Slot))
    }

    /// Unescaped character content of this element
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(raw) => match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                },
                XmlNode::CData(raw) => out.push_str(raw),
                _ => {}
            }
        }
        out
    }

    /// Replace the character content; child elements are kept
    pub fn set_text(&mut self, text: &str) {
        self.children
            .retain(|c| !matches!(c, XmlNode::Text(_) | XmlNode::CData(_)));
        if !text.is_empty() {
            let escaped: Cow<str> = partial_escape(text);
            self.children.insert(0, XmlNode::Text(escaped.into_owned()));
        }
    }

    /// Typed view of this element's text
    pub fn value(&self) -> Value {
        Value::infer(&self.text())
    }

    // --- queries ---

    /// First element matching `path` below this one
    pub fn find(&self, path: &str) -> Option<&DocumentNode> {
        let query = QueryPath::parse(path);
        let mut current = self;
        for segment in query.segments() {
            current = current.elements().find(|e| segment.matches(e))?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut DocumentNode> {
        let query = QueryPath::parse(path);
        let mut current = self;
        for segment in query.segments() {
            current = current.elements_mut().find(|e| segment.matches(e))?;
        }
        Some(current)
    }

    /// Every element matching `path`, following all branches
    pub fn find_all(&self, path: &str) -> Vec<&DocumentNode> {
        let query = QueryPath::parse(path);
        let mut current = vec![self];
        for segment in query.segments() {
            current = current
                .into_iter()
                .flat_map(|node| node.elements().filter(|e| segment.matches(e)))
                .collect();
        }
        current
    }

    /// Element at `path`, created (with its predicate fields) when missing
    pub fn find_or_create(&mut self, path: &str, indent: &Indent) -> &mut DocumentNode {
        let query = QueryPath::parse(path);
        let mut current = self;
        let mut indent = indent.clone();
        for segment in query.segments() {
            let existing = current
                .children
                .iter()
                .position(|c| matches!(c, XmlNode::Element(e) if segment.matches(e)));
            current = match existing {
                Some(index) => current.element_at_mut(index),
                None => current.append_element(segment.create(), &indent),
            };
            indent = indent.nested();
        }
        current
    }

    /// Text of the element at `path`
    pub fn field(&self, path: &str) -> Option<String> {
        self.find(path).map(DocumentNode::text)
    }

    pub fn field_value(&self, path: &str) -> Option<Value> {
        self.find(path).map(DocumentNode::value)
    }

    /// Set the text of the element at `path`, creating it if needed
    pub fn set_field(&mut self, path: &str, text: &str, indent: &Indent) {
        self.find_or_create(path, indent).set_text(text);
    }

    /// Remove the first element at `path` together with its leading indentation
    pub fn remove(&mut self, path: &str) -> Option<DocumentNode> {
        let query = QueryPath::parse(path);
        let (last, parents) = query.segments().split_last()?;
        let mut parent = self;
        for segment in parents {
            parent = parent.elements_mut().find(|e| segment.matches(e))?;
        }
        let index = parent
            .children
            .iter()
            .position(|c| matches!(c, XmlNode::Element(e) if last.matches(e)))?;
        match parent.remove_child(index) {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Remove every descendant element called `name`; returns how many went
    pub fn remove_all_named(&mut self, name: &str) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.children.len() {
            let hit = matches!(&self.children[index], XmlNode::Element(e) if e.name == name);
            if hit {
                let had_lead = index > 0 && self.children[index - 1].is_blank();
                self.remove_child(index);
                if had_lead {
                    index -= 1;
                }
                removed += 1;
            } else {
                if let XmlNode::Element(e) = &mut self.children[index] {
                    removed += e.remove_all_named(name);
                }
                index += 1;
            }
        }
        removed
    }

    /// Keep the first `keep` child elements and drop the rest with their indentation
    pub fn truncate_elements(&mut self, keep: usize) -> usize {
        let surplus: Vec<usize> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, XmlNode::Element(_)))
            .map(|(i, _)| i)
            .skip(keep)
            .collect();
        for &index in surplus.iter().rev() {
            self.remove_child(index);
        }
        surplus.len()
    }

    // --- editing ---

    /// Append a child element after the last element or slot
    ///
    /// The whitespace in front of the last sibling is copied so the new
    /// element lines up with it. With no siblings the indent decides.
    pub fn append_element(&mut self, mut child: DocumentNode, indent: &Indent) -> &mut DocumentNode {
        if let Some(unit) = &indent.unit {
            child.indent_generated(indent.depth + 1, unit);
        }
        let last = self
            .children
            .iter()
            .rposition(|c| matches!(c, XmlNode::Element(_) | XmlNode::Slot));
        let index = match last {
            Some(last) => {
                let lead = match last.checked_sub(1).map(|i| &self.children[i]) {
                    Some(XmlNode::Text(t)) if is_blank(t) => Some(t.clone()),
                    _ => indent.line(indent.depth),
                };
                let mut at = last + 1;
                if let Some(lead) = lead {
                    self.children.insert(at, XmlNode::Text(lead));
                    at += 1;
                }
                self.children.insert(at, XmlNode::Element(child));
                at
            }
            None => {
                if self.children.iter().all(XmlNode::is_blank) {
                    self.children.clear();
                }
                if let Some(lead) = indent.line(indent.depth) {
                    self.children.push(XmlNode::Text(lead));
                }
                self.children.push(XmlNode::Element(child));
                let at = self.children.len() - 1;
                if let Some(close) = indent.line(indent.depth.saturating_sub(1)) {
                    self.children.push(XmlNode::Text(close));
                }
                at
            }
        };
        self.element_at_mut(index)
    }

    /// Replace the child element at `index` by a slot and hand it out
    pub fn promote(&mut self, index: usize) -> Option<DocumentNode> {
        match self.children.get(index) {
            Some(XmlNode::Element(_)) => {
                match std::mem::replace(&mut self.children[index], XmlNode::Slot) {
                    XmlNode::Element(e) => Some(e),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.children
            .iter()
            .filter(|c| matches!(c, XmlNode::Slot))
            .count()
    }

    /// Put `elements` back into the slots in order
    ///
    /// Slots left over are removed along with their indentation. Elements
    /// beyond the number of slots are appended after the last one.
    pub fn fill_slots(&mut self, elements: Vec<DocumentNode>, indent: &Indent) {
        let slots: Vec<usize> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, XmlNode::Slot))
            .map(|(i, _)| i)
            .collect();
        let mut elements = elements.into_iter();
        let mut unused = Vec::new();
        for &slot in &slots {
            match elements.next() {
                Some(e) => self.children[slot] = XmlNode::Element(e),
                None => unused.push(slot),
            }
        }
        for &slot in unused.iter().rev() {
            self.remove_child(slot);
        }
        for extra in elements {
            self.append_element(extra, indent);
        }
    }

    /// Drop whitespace-only text everywhere below this element
    pub fn strip_whitespace(&mut self) {
        if self.children.iter().any(|c| matches!(c, XmlNode::Element(_))) {
            self.children.retain(|c| !c.is_blank());
        }
        for e in self.elements_mut() {
            e.strip_whitespace();
        }
    }

    pub(crate) fn raw_start(&self) -> Option<&str> {
        self.raw_start.as_deref()
    }

    pub(crate) fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    fn element_at_mut(&mut self, index: usize) -> &mut DocumentNode {
        match &mut self.children[index] {
            XmlNode::Element(e) => e,
            _ => unreachable!("child {index} is not an element"),
        }
    }

    fn remove_child(&mut self, index: usize) -> XmlNode {
        let node = self.children.remove(index);
        if index > 0 && self.children[index - 1].is_blank() {
            self.children.remove(index - 1);
        }
        node
    }

    /// Lay out a freshly built subtree that carries no whitespace yet
    fn indent_generated(&mut self, child_depth: usize, unit: &str) {
        let has_elements = self.children.iter().any(|c| matches!(c, XmlNode::Element(_)));
        let has_text = self
            .children
            .iter()
            .any(|c| matches!(c, XmlNode::Text(_) | XmlNode::CData(_)));
        if !has_elements || has_text {
            return;
        }
        let old = std::mem::take(&mut self.children);
        for mut child in old {
            self.children
                .push(XmlNode::Text(format!("\n{}", unit.repeat(child_depth))));
            if let XmlNode::Element(e) = &mut child {
                e.indent_generated(child_depth + 1, unit);
            }
            self.children.push(child);
        }
        self.children.push(XmlNode::Text(format!(
            "\n{}",
            unit.repeat(child_depth.saturating_sub(1))
        )));
    }
}

/// A whole document: its top-level items plus encoding details
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    top: DocumentNode,
    bom: bool,
    fragment: bool,
}

impl Document {
    /// Parse a document with exactly one root element
    ///
    /// # Errors
    /// Returns [`FormatError`] for malformed markup, unclosed or mismatched
    /// tags, truncated input and documents with zero or several roots.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        reader::parse(text, false)
    }

    /// Parse a document that may hold several top-level elements
    pub fn parse_fragment(text: &str) -> Result<Self, FormatError> {
        reader::parse(text, true)
    }

    /// Parse raw bytes, rejecting invalid UTF-8
    pub fn parse_bytes(bytes: &[u8], fragment: bool) -> Result<Self, FormatError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => reader::parse(text, fragment),
            Err(e) => {
                let valid = String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned();
                Err(FormatError::at_offset(
                    &valid,
                    valid.len(),
                    "invalid UTF-8 sequence",
                ))
            }
        }
    }

    /// A document holding `root` and nothing else
    pub fn from_root(root: DocumentNode) -> Self {
        Self {
            top: DocumentNode::default().with_child(root),
            bom: false,
            fragment: false,
        }
    }

    /// A fragment document made of `elements`
    pub fn from_elements(elements: Vec<DocumentNode>) -> Self {
        let mut top = DocumentNode::default();
        for e in elements {
            top.children.push(XmlNode::Element(e));
        }
        Self {
            top,
            bom: false,
            fragment: true,
        }
    }

    pub fn from_parts(top: DocumentNode, bom: bool, fragment: bool) -> Self {
        Self { top, bom, fragment }
    }

    pub fn into_parts(self) -> (DocumentNode, bool, bool) {
        (self.top, self.bom, self.fragment)
    }

    /// Synthetic node holding all top-level items
    pub fn top(&self) -> &DocumentNode {
        &self.top
    }

    pub fn top_mut(&mut self) -> &mut DocumentNode {
        &mut self.top
    }

    pub fn root(&self) -> Option<&DocumentNode> {
        self.top.elements().next()
    }

    pub fn root_mut(&mut self) -> Option<&mut DocumentNode> {
        self.top.elements_mut().next()
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    pub fn has_bom(&self) -> bool {
        self.bom
    }

    /// Indentation unit used by the document (tab if none can be seen)
    pub fn indent_unit(&self) -> String {
        detect_indent_unit(&self.top)
    }

    /// Serialize exactly as parsed, with edits applied
    pub fn to_xml_string(&self) -> String {
        writer::write_verbatim(self)
    }

    /// Serialize ignoring source whitespace, one element per line
    pub fn to_pretty_string(&self, unit: &str) -> String {
        writer::write_pretty(self, unit)
    }
}

/// Element whose children the scene mapper reads: the root element, or the
/// synthetic top node of a fragment
pub fn content(top: &DocumentNode, fragment: bool) -> Option<&DocumentNode> {
    if fragment {
        Some(top)
    } else {
        top.elements().next()
    }
}

pub fn content_mut(top: &mut DocumentNode, fragment: bool) -> Option<&mut DocumentNode> {
    if fragment {
        Some(top)
    } else {
        top.elements_mut().next()
    }
}

/// Whitespace after the last line break in front of the first child of the
/// first top-level element
pub(crate) fn detect_indent_unit(top: &DocumentNode) -> String {
    top.elements()
        .next()
        .and_then(|root| {
            root.children().iter().find_map(|c| match c {
                XmlNode::Text(t) if is_blank(t) && t.contains('\n') => {
                    t.rsplit('\n').next().map(str::to_string)
                }
                _ => None,
            })
        })
        .filter(|unit| !unit.is_empty())
        .unwrap_or_else(|| "\t".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Config>\n\t<FileName>data/a.rdm</FileName>\n\t<Models>\n\t\t<Config>\n\t\t\t<ConfigType>MODEL</ConfigType>\n\t\t</Config>\n\t</Models>\n</Config>\n";

    #[test]
    fn test_roundtrip_identity() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.to_xml_string(), SAMPLE);
    }

    #[test]
    fn test_roundtrip_preserves_odd_spelling() {
        let text = "\u{feff}<A  x='q&amp;r' >a &lt; b<!-- c --><B/><C /><![CDATA[<raw>]]></A>\r\n";
        let doc = Document::parse(text).unwrap();
        assert!(doc.has_bom());
        assert_eq!(doc.to_xml_string(), text);
        let root = doc.root().unwrap();
        assert_eq!(root.attribute("x"), Some("q&r"));
    }

    #[test]
    fn test_field_and_text_unescape() {
        let doc = Document::parse("<A><B>x &amp; y</B></A>").unwrap();
        assert_eq!(doc.root().unwrap().field("B").as_deref(), Some("x & y"));
    }

    #[test]
    fn test_set_field_escapes() {
        let mut doc = Document::parse("<A><B>1</B></A>").unwrap();
        let root = doc.root_mut().unwrap();
        root.set_field("B", "a<b", &Indent::compact());
        assert_eq!(doc.to_xml_string(), "<A><B>a&lt;b</B></A>");
    }

    #[test]
    fn test_find_or_create_matches_indentation() {
        let text = "<A>\n\t<B>1</B>\n</A>";
        let mut doc = Document::parse(text).unwrap();
        let root = doc.root_mut().unwrap();
        root.set_field("C/D", "2", &Indent::new("\t", 1));
        assert_eq!(
            doc.to_xml_string(),
            "<A>\n\t<B>1</B>\n\t<C>\n\t\t<D>2</D>\n\t</C>\n</A>"
        );
    }

    #[test]
    fn test_append_into_empty_element() {
        let mut doc = Document::parse("<A>\n\t<List></List>\n</A>").unwrap();
        let list = doc.root_mut().unwrap().find_mut("List").unwrap();
        list.append_element(DocumentNode::with_text("Item", "1"), &Indent::new("\t", 2));
        assert_eq!(
            doc.to_xml_string(),
            "<A>\n\t<List>\n\t\t<Item>1</Item>\n\t</List>\n</A>"
        );
    }

    #[test]
    fn test_predicate_query() {
        let text = "<A><T><Config><ConfigType>X</ConfigType><V>1</V></Config><Config><ConfigType>Y</ConfigType><V>2</V></Config></T></A>";
        let doc = Document::parse(text).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.field("T/Config[ConfigType='Y']/V").as_deref(), Some("2"));
        assert_eq!(root.find_all("T/Config/V").len(), 2);
    }

    #[test]
    fn test_find_or_create_with_predicate() {
        let mut node = DocumentNode::new("A");
        node.set_field("T/Config[ConfigType='ORIENTATION_TRANSFORM']/Position.x", "1", &Indent::compact());
        let config = node.find("T/Config").unwrap();
        assert_eq!(config.field("ConfigType").as_deref(), Some("ORIENTATION_TRANSFORM"));
        assert_eq!(config.field("Position.x").as_deref(), Some("1"));
    }

    #[test]
    fn test_promote_and_fill_slots() {
        let text = "<A>\n\t<M>1</M>\n\t<M>2</M>\n\t<M>3</M>\n</A>";
        let mut doc = Document::parse(text).unwrap();
        let root = doc.root_mut().unwrap();
        let indices: Vec<usize> = root
            .children()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_element().is_some())
            .map(|(i, _)| i)
            .collect();
        let taken: Vec<DocumentNode> = indices.iter().filter_map(|&i| root.promote(i)).collect();
        assert_eq!(root.slot_count(), 3);

        let mut reordered = taken.clone();
        reordered.swap(0, 2);
        root.fill_slots(reordered, &Indent::new("\t", 1));
        assert_eq!(doc.to_xml_string(), "<A>\n\t<M>3</M>\n\t<M>2</M>\n\t<M>1</M>\n</A>");
    }

    #[test]
    fn test_fill_slots_removes_and_appends() {
        let text = "<A>\n\t<M>1</M>\n\t<M>2</M>\n</A>";
        let mut doc = Document::parse(text).unwrap();
        let root = doc.root_mut().unwrap();
        let first = root.promote(1).unwrap();
        root.promote(3).unwrap();
        root.fill_slots(vec![first.clone()], &Indent::new("\t", 1));
        assert_eq!(doc.to_xml_string(), "<A>\n\t<M>1</M>\n</A>");

        let root = doc.root_mut().unwrap();
        root.promote(1).unwrap();
        root.fill_slots(
            vec![first, DocumentNode::with_text("M", "9")],
            &Indent::new("\t", 1),
        );
        assert_eq!(doc.to_xml_string(), "<A>\n\t<M>1</M>\n\t<M>9</M>\n</A>");
    }

    #[test]
    fn test_remove_with_indentation() {
        let mut doc = Document::parse("<A>\n\t<B/>\n\t<C/>\n</A>").unwrap();
        let removed = doc.root_mut().unwrap().remove("B").unwrap();
        assert_eq!(removed.name(), "B");
        assert_eq!(doc.to_xml_string(), "<A>\n\t<C/>\n</A>");
    }

    #[test]
    fn test_remove_all_named() {
        let text = "<A>\n\t<X/>\n\t<B>\n\t\t<X>1</X>\n\t\t<Y/>\n\t</B>\n</A>";
        let mut doc = Document::parse(text).unwrap();
        assert_eq!(doc.root_mut().unwrap().remove_all_named("X"), 2);
        assert_eq!(doc.to_xml_string(), "<A>\n\t<B>\n\t\t<Y/>\n\t</B>\n</A>");
    }

    #[test]
    fn test_truncate_elements() {
        let mut doc = Document::parse("<A>\n\t<i>1</i>\n\t<i>2</i>\n\t<i>3</i>\n</A>").unwrap();
        assert_eq!(doc.root_mut().unwrap().truncate_elements(1), 2);
        assert_eq!(doc.to_xml_string(), "<A>\n\t<i>1</i>\n</A>");
        assert_eq!(doc.root_mut().unwrap().truncate_elements(4), 0);
    }

    #[test]
    fn test_set_attribute_rewrites_start_tag() {
        let mut doc = Document::parse("<A  k = \"1\" ><B/></A>").unwrap();
        doc.root_mut().unwrap().set_attribute("k", "2");
        assert_eq!(doc.to_xml_string(), "<A k=\"2\"><B/></A>");
    }

    #[test]
    fn test_indent_unit_detection() {
        let doc = Document::parse("<A>\n  <B/>\n</A>").unwrap();
        assert_eq!(doc.indent_unit(), "  ");
        let flat = Document::parse("<A><B/></A>").unwrap();
        assert_eq!(flat.indent_unit(), "\t");
    }

    #[test]
    fn test_multiple_roots_rejected() {
        assert!(Document::parse("<A/><B/>").is_err());
        let frag = Document::parse_fragment("<A/>\n<B/>\n").unwrap();
        assert_eq!(frag.top().element_count(), 2);
        assert_eq!(frag.to_xml_string(), "<A/>\n<B/>\n");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = Document::parse_bytes(b"<A>\xff</A>", false).unwrap_err();
        assert!(err.message.contains("UTF-8"));
    }
}
