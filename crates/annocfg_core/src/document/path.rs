//! Query paths over document trees
//!
//! A path is a `/`-separated list of element names. A segment may carry a
//! single predicate on a child field, `Config[ConfigType='MODEL']`, which
//! selects the first `Config` whose `ConfigType` child has that text.

use super::DocumentNode;

/// One step of a query path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    /// `(field, text)` the element's child must match
    pub predicate: Option<(String, String)>,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let (Some(open), true) = (raw.find('['), raw.ends_with(']')) {
            let inner = &raw[open + 1..raw.len() - 1];
            if let Some((field, value)) = inner.split_once('=') {
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));
                if let Some(value) = unquoted {
                    return Self {
                        name: raw[..open].trim().to_string(),
                        predicate: Some((field.trim().to_string(), value.to_string())),
                    };
                }
            }
        }
        Self {
            name: raw.to_string(),
            predicate: None,
        }
    }

    /// True if `node` is selected by this segment
    pub fn matches(&self, node: &DocumentNode) -> bool {
        if node.name() != self.name {
            return false;
        }
        match &self.predicate {
            Some((field, value)) => node
                .find(field)
                .map(|f| f.text() == *value)
                .unwrap_or(false),
            None => true,
        }
    }

    /// New element satisfying this segment
    pub fn create(&self) -> DocumentNode {
        let node = DocumentNode::new(self.name.clone());
        match &self.predicate {
            Some((field, value)) => node.with_field(field, value),
            None => node,
        }
    }
}

/// Parsed query path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPath {
    segments: Vec<Segment>,
}

impl QueryPath {
    /// Parse a path; `/` inside a predicate does not split
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in path.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '/' if depth == 0 => {
                    if i > start {
                        segments.push(Segment::parse(&path[start..i]));
                    }
                    start = i + 1;
                }
                _ => {}
            }
        }
        if start < path.len() {
            segments.push(Segment::parse(&path[start..]));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let q = QueryPath::parse("Transformer/Config/Position.x");
        let names: Vec<&str> = q.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Transformer", "Config", "Position.x"]);
        assert!(q.segments().iter().all(|s| s.predicate.is_none()));
    }

    #[test]
    fn test_predicate_segment() {
        let q = QueryPath::parse("Transformer/Config[ConfigType='ORIENTATION_TRANSFORM']/Scale");
        let seg = &q.segments()[1];
        assert_eq!(seg.name, "Config");
        assert_eq!(
            seg.predicate,
            Some(("ConfigType".to_string(), "ORIENTATION_TRANSFORM".to_string()))
        );
    }

    #[test]
    fn test_predicate_with_slash_in_value() {
        let q = QueryPath::parse("Files/Config[FileName=\"data/a.cfg\"]");
        assert_eq!(q.segments().len(), 2);
        assert_eq!(q.segments()[1].predicate.as_ref().unwrap().1, "data/a.cfg");
    }

    #[test]
    fn test_segment_create_carries_predicate() {
        let seg = Segment::parse("Config[ConfigType='X']");
        let node = seg.create();
        assert!(seg.matches(&node));
    }

    #[test]
    fn test_empty_segments_skipped() {
        assert_eq!(QueryPath::parse("/A//B/").segments().len(), 2);
    }
}
