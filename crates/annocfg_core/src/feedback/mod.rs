//! Compact feedback encoding → native `.cf7` code generation
//!
//! The compact form (root `SimpleAnnoFeedbackEncoding`) lists dummy groups
//! with their dummies, an optional `GUIDNames` table and feedback configs
//! made of readable sequence elements. [`transcode`] turns it into the
//! native dummy/feedback fragment the game reads: dummies get numeric ids,
//! sequence names become sequence ids and each config is expanded into its
//! two-loop sequence definition.
//!
//! The direction is one way. Native documents are never turned back into
//! the compact form.

pub mod sequences;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asset_cache::Asset;
use crate::document::{Document, DocumentNode};
use crate::error::{AssetError, FormatError, StructuralError, TranscodeError, ValidationWarning};

/// Root tag of a compact feedback document
pub const FEEDBACK_ROOT: &str = "SimpleAnnoFeedbackEncoding";

/// Default `FeedbackLoops` key
pub const DEFAULT_LOOP_MODE: i64 = 1;

/// Indent unit of generated `.cf7` text
pub const CF7_INDENT: &str = " ";

/// Config properties copied through with their defaults; `None` writes an
/// empty element
const CONFIG_PROPERTIES: &[(&str, Option<&str>)] = &[
    ("Description", Some("")),
    ("IgnoreRootObjectXZRotation", Some("0")),
    ("IsAlwaysVisibleActor", Some("0")),
    ("ApplyScaleToMovementSpeed", Some("1")),
    ("ActorCount", Some("1")),
    ("MaxActorCount", Some("1")),
    ("CreateChance", Some("100")),
    ("BoneLink", Some("NoLink")),
    ("RenderFlags", Some("0")),
    ("MultiplyActorByDummyCount", None),
    ("IgnoreForceActorVariation", Some("0")),
    ("IgnoreDistanceScale", Some("0")),
];

/// Result of a transcode: the generated fragment plus what was skipped
#[derive(Clone, Debug)]
pub struct Transcoded {
    pub document: Document,
    pub warnings: Vec<ValidationWarning>,
    /// Final value of the id counter
    pub id_counter: i64,
}

impl Transcoded {
    /// `.cf7` text, one element per line with one-space indentation
    pub fn to_text(&self) -> String {
        self.document.to_pretty_string(CF7_INDENT)
    }
}

/// Text of the element at `path`; an element holding `None` counts as empty
fn text_or(node: &DocumentNode, path: &str, default: &str) -> String {
    match node.field(path) {
        Some(text) if text == "None" => String::new(),
        Some(text) => text,
        None => default.to_string(),
    }
}

fn required(node: &DocumentNode, path: &str, owner: &str) -> Result<String, StructuralError> {
    match node.field(path) {
        Some(text) if text == "None" => Ok(String::new()),
        Some(text) => Ok(text),
        None => Err(StructuralError::MissingField {
            node: owner.to_string(),
            field: path.to_string(),
        }),
    }
}

fn leaf(name: &str, text: &str) -> DocumentNode {
    DocumentNode::with_text(name, text)
}

/// Check that `names` are `<group>_0`, `<group>_1`, ... in this order
///
/// # Errors
/// Returns [`StructuralError::DummyGroupGap`] naming the first offender.
pub fn check_group_naming(group: &str, names: &[&str]) -> Result<(), StructuralError> {
    let prefix = format!("{}_", group);
    for (expected, name) in names.iter().enumerate() {
        let index = name
            .strip_prefix(&prefix)
            .and_then(|suffix| suffix.parse::<usize>().ok());
        match index {
            Some(index) if index == expected => {}
            Some(index) => {
                return Err(StructuralError::DummyGroupGap {
                    group: group.to_string(),
                    message: format!(
                        "dummy '{}' has index {}, expected {}",
                        name, index, expected
                    ),
                })
            }
            None => {
                return Err(StructuralError::DummyGroupGap {
                    group: group.to_string(),
                    message: format!("dummy '{}' is not named {}<index>", name, prefix),
                })
            }
        }
    }
    Ok(())
}

/// Unit names usable in a `GUIDVariationList` without a `GUIDNames` entry
///
/// Stored as a RON map from name to numeric GUID, for example
/// `{ "worker_f": "1234567" }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidNames {
    names: BTreeMap<String, String>,
}

impl GuidNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns the RON parse error with its position.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn insert(&mut self, name: impl Into<String>, guid: impl Into<String>) {
        self.names.insert(name.into(), guid.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Asset for GuidNames {
    fn load_from_file(path: &Path) -> Result<Self, AssetError> {
        let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        GuidNames::from_ron(&text).map_err(|e| AssetError::Format {
            path: path.to_path_buf(),
            source: FormatError {
                line: e.position.line,
                column: e.position.col,
                message: e.code.to_string(),
            },
        })
    }
}

struct Encoder<'a> {
    ids: HashMap<String, i64>,
    counter: i64,
    /// The document's own `GUIDNames` table
    guid_by_name: HashMap<String, String>,
    fallback: &'a GuidNames,
    warnings: Vec<ValidationWarning>,
}

impl<'a> Encoder<'a> {
    fn new(fallback: &'a GuidNames) -> Self {
        Self {
            ids: HashMap::new(),
            // 1 belongs to the dummy root
            counter: 1,
            guid_by_name: HashMap::new(),
            fallback,
            warnings: Vec::new(),
        }
    }

    fn register(&mut self, group: &str, name: &str) -> Result<i64, StructuralError> {
        if self.ids.contains_key(name) {
            return Err(StructuralError::DuplicateDummy {
                group: group.to_string(),
                name: name.to_string(),
            });
        }
        self.counter += 1;
        self.ids.insert(name.to_string(), self.counter);
        Ok(self.counter)
    }

    fn id_text(&self, name: &str) -> String {
        self.ids
            .get(name)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "0".to_string())
    }

    fn read_guid_names(&mut self, root: &DocumentNode) -> Result<(), StructuralError> {
        for item in root.find_all("GUIDNames/Item") {
            let name = required(item, "Name", "GUIDNames/Item")?;
            let guid = required(item, "GUID", "GUIDNames/Item")?;
            self.guid_by_name.insert(name, guid);
        }
        Ok(())
    }

    fn encode_groups(&mut self, root: &DocumentNode) -> Result<Vec<DocumentNode>, StructuralError> {
        let mut groups = Vec::new();
        for group in root.find_all("DummyGroups/DummyGroup") {
            let name = required(group, "Name", "DummyGroup")?;
            let id = self.register(&name, &name)?;

            let mut dummies = Vec::new();
            let mut names = Vec::new();
            for dummy in group.elements().filter(|e| e.name() == "Dummy") {
                let dummy_name = required(dummy, "Name", &name)?;
                let dummy_id = self.register(&name, &dummy_name)?;
                let mut native = dummy.clone();
                native.strip_whitespace();
                native.set_name("i");
                native = native
                    .with_field("Id", &dummy_id.to_string())
                    .with_field("hasValue", "1")
                    .with_field("RotationY", "0.000000");
                dummies.push(native);
                names.push(dummy_name);
            }
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            check_group_naming(&name, &name_refs)?;

            let mut list = DocumentNode::new("Dummies");
            for dummy in dummies {
                list = list.with_child(dummy);
            }
            groups.push(
                DocumentNode::new("i")
                    .with_child(leaf("hasValue", "1"))
                    .with_child(leaf("Name", &name))
                    .with_child(leaf("Id", &id.to_string()))
                    .with_child(DocumentNode::new("Groups"))
                    .with_child(list),
            );
        }
        Ok(groups)
    }

    fn guid_variations(&mut self, config: &DocumentNode) -> Vec<String> {
        let mut guids = Vec::new();
        for guid in config.find_all("GUIDVariationList/GUID") {
            let raw = guid.text().trim().to_string();
            let mapped = match self.guid_by_name.get(&raw) {
                Some(guid) => guid.clone(),
                None => self.fallback.get(&raw).map(str::to_string).unwrap_or(raw),
            };
            if !mapped.is_empty() && mapped.chars().all(|c| c.is_ascii_digit()) {
                guids.push(mapped);
            } else {
                self.warnings.push(ValidationWarning::new(
                    "FeedbackConfig",
                    format!("invalid GUID '{}' skipped: not numeric and not a known unit name", mapped),
                ));
            }
        }
        guids
    }

    fn encode_config(&mut self, config: &DocumentNode, loop_mode: i64) -> Result<DocumentNode, StructuralError> {
        let owner = "FeedbackConfig";
        let min_scale = required(config, "Scale/m_MinScaleFactor", owner)?;
        let max_scale = required(config, "Scale/m_MaxScaleFactor", owner)?;
        let default_dummy = required(config, "DefaultStateDummy", owner)?;
        let start_group = text_or(config, "StartDummyGroup", "");

        let mut out = DocumentNode::new("i")
            .with_child(leaf("hasValue", "1"))
            .with_child(leaf("MainObject", "0"));
        for (property, default) in CONFIG_PROPERTIES {
            let value = match (config.field(property), default) {
                (Some(text), _) if text == "True" => "1".to_string(),
                (Some(text), _) if text == "False" => "0".to_string(),
                (Some(text), _) if text == "None" => String::new(),
                (Some(text), _) => text,
                (None, Some(default)) => default.to_string(),
                (None, None) => String::new(),
            };
            out = out.with_child(leaf(property, &value));
        }

        let guids = self.guid_variations(config);
        let packed: Vec<String> = guids.iter().map(|g| format!("{} -1", g)).collect();
        out = out
            .with_child(
                DocumentNode::new("AssetVariationList")
                    .with_child(leaf(
                        "GuidVariationList",
                        &format!("CDATA[{} {}]", 8 * guids.len(), packed.join(" ")),
                    ))
                    .with_child(DocumentNode::new("AssetGroupNames")),
            )
            .with_child(
                DocumentNode::new("FeedbackLoops")
                    .with_child(leaf("k", &loop_mode.to_string()))
                    .with_child(leaf("v", "0")),
            );

        let elements = self.encode_elements(config, &start_group)?;
        let loop0 = DocumentNode::new("Loop0")
            .with_child(leaf("hasValue", "1"))
            .with_child(default_state("", "", "0"))
            .with_child(DocumentNode::new("StartDummyGroup"))
            .with_child(
                DocumentNode::new("ElementContainer").with_child(
                    DocumentNode::new("Elements").with_child(
                        DocumentNode::new("i")
                            .with_child(leaf("hasValue", "1"))
                            .with_child(leaf("elementType", "9"))
                            .with_child(leaf("m_MinScaleFactor", &min_scale))
                            .with_child(leaf("m_MaxScaleFactor", &max_scale)),
                    ),
                ),
            );
        let mut loop1_elements = DocumentNode::new("Elements");
        for element in elements {
            loop1_elements = loop1_elements.with_child(element);
        }
        let loop1 = DocumentNode::new("Loop1")
            .with_child(leaf("hasValue", "1"))
            .with_child(default_state(
                &default_dummy,
                &start_group,
                &self.id_text(&default_dummy),
            ))
            .with_child(DocumentNode::new("ElementContainer").with_child(loop1_elements));

        Ok(out.with_child(
            DocumentNode::new("SequenceDefinitions").with_child(
                DocumentNode::new("i")
                    .with_child(leaf("hasValue", "1"))
                    .with_child(loop0)
                    .with_child(loop1),
            ),
        ))
    }

    fn encode_elements(&self, config: &DocumentNode, start_group: &str) -> Result<Vec<DocumentNode>, StructuralError> {
        let sources: Vec<&DocumentNode> = config
            .find("SequenceElements")
            .map(|list| list.elements().collect())
            .unwrap_or_default();

        // A start group turns all idle animations into one multi-actor element
        if !start_group.is_empty() {
            let mut ids = Vec::new();
            for source in sources.iter().filter(|s| s.name() == "IdleAnimation") {
                let name = required(source, "m_IdleSequenceID", "IdleAnimation")?;
                ids.push(sequences::sequence_id(&name).to_string());
            }
            return Ok(vec![DocumentNode::new("i")
                .with_child(leaf(
                    "m_SequenceIds",
                    &format!("CDATA[{} {}]", 4 * ids.len(), ids.join(" ")),
                ))
                .with_child(leaf("hasValue", "1"))
                .with_child(leaf("elementType", "12"))
                .with_child(leaf("MinPlayCount", "1"))
                .with_child(leaf("MaxPlayCount", "2"))
                .with_child(leaf("MinPlayTime", "0"))
                .with_child(leaf("MaxPlayTime", "0"))]);
        }

        let mut out = Vec::new();
        for source in sources {
            let tag = source.name();
            let req = |path: &str| required(source, path, tag);
            let seq = |path: &str| -> Result<String, StructuralError> {
                Ok(sequences::sequence_id(&req(path)?).to_string())
            };
            let fields: Vec<(&str, String)> = match tag {
                "IdleAnimation" => vec![
                    ("elementType", "1".into()),
                    ("m_IdleSequenceID", seq("m_IdleSequenceID")?),
                    ("ResetStartTime", "0".into()),
                    ("MinPlayCount", req("MinPlayCount")?),
                    ("MaxPlayCount", req("MaxPlayCount")?),
                    ("MinPlayTime", "0".into()),
                    ("MaxPlayTime", "0".into()),
                ],
                "TimedIdleAnimation" => vec![
                    ("elementType", "1".into()),
                    ("m_IdleSequenceID", seq("m_IdleSequenceID")?),
                    ("MinPlayCount", "0".into()),
                    ("MaxPlayCount", "0".into()),
                    ("MinPlayTime", req("MinPlayTime")?),
                    ("MaxPlayTime", req("MaxPlayTime")?),
                    ("ResetStartTime", "0".into()),
                ],
                "Walk" => {
                    let target = req("TargetDummy")?;
                    vec![
                        ("elementType", "0".into()),
                        ("WalkSequence", seq("WalkSequence")?),
                        ("TargetDummy", target.clone()),
                        ("TargetDummyId", self.id_text(&target)),
                        ("SpeedFactorF", req("SpeedFactorF")?),
                        ("StartDummy", String::new()),
                        ("StartDummyId", "0".into()),
                        ("WalkFromCurrentPosition", "1".into()),
                        ("UseTargetDummyDirection", "1".into()),
                        ("DummyGroup", "CDATA[12 -1 -1 -1]".into()),
                    ]
                }
                "Wait" => vec![
                    ("elementType", "2".into()),
                    ("MinTime", req("MinTime")?),
                    ("MaxTime", req("MaxTime")?),
                ],
                "TurnAngle" => vec![
                    ("elementType", "10".into()),
                    ("TurnAngleF", req("TurnAngleF")?),
                    ("TurnSequence", req("TurnSequence")?),
                    ("TurnToDummy", String::new()),
                    ("TurnToDummyID", "0".into()),
                ],
                "TurnToDummy" => {
                    let target = req("TurnToDummy")?;
                    vec![
                        ("elementType", "10".into()),
                        ("TurnAngleF", "0".into()),
                        ("TurnSequence", req("TurnSequence")?),
                        ("TurnToDummy", target.clone()),
                        ("TurnToDummyID", self.id_text(&target)),
                    ]
                }
                _ => Vec::new(),
            };
            let mut element = DocumentNode::new("i").with_child(leaf("hasValue", "1"));
            for (name, text) in fields {
                element = element.with_child(leaf(name, &text));
            }
            out.push(element);
        }
        Ok(out)
    }
}

fn default_state(dummy: &str, start_group: &str, dummy_id: &str) -> DocumentNode {
    DocumentNode::new("DefaultState")
        .with_child(leaf("DummyName", dummy))
        .with_child(leaf("StartDummyGroup", start_group))
        .with_child(leaf("DummyId", dummy_id))
        .with_child(leaf("SequenceID", "-1"))
        .with_child(leaf("Visible", "1"))
        .with_child(leaf("FadeVisibility", "1"))
        .with_child(leaf("ResetToDefaultEveryLoop", "1"))
        .with_child(leaf("ForceSequenceRestart", "0"))
}

/// Generate the native `.cf7` fragment for a compact feedback document
///
/// # Errors
/// - [`TranscodeError::WrongRoot`] if the root is not `SimpleAnnoFeedbackEncoding`
/// - [`StructuralError::DuplicateDummy`] for a name used twice across groups and dummies
/// - [`StructuralError::DummyGroupGap`] for group members not named `<group>_<index>`
/// - [`StructuralError::MissingField`] for missing required fields
pub fn transcode(doc: &Document, loop_mode: i64) -> Result<Transcoded, TranscodeError> {
    transcode_with_names(doc, loop_mode, &GuidNames::default())
}

/// [`transcode`], resolving GUID names missing from the document's
/// `GUIDNames` table through `names`
///
/// # Errors
/// Same as [`transcode`].
pub fn transcode_with_names(doc: &Document, loop_mode: i64, names: &GuidNames) -> Result<Transcoded, TranscodeError> {
    let root = doc.root().ok_or_else(|| TranscodeError::WrongRoot {
        found: String::new(),
    })?;
    if root.name() != FEEDBACK_ROOT {
        return Err(TranscodeError::WrongRoot {
            found: root.name().to_string(),
        });
    }

    let mut encoder = Encoder::new(names);
    encoder.read_guid_names(root)?;
    let groups = encoder.encode_groups(root)?;

    let mut configs = DocumentNode::new("FeedbackConfigs");
    for config in root.find_all("FeedbackConfigs/FeedbackConfig") {
        configs = configs.with_child(encoder.encode_config(config, loop_mode)?);
    }

    let mut group_list = DocumentNode::new("Groups");
    for group in groups {
        group_list = group_list.with_child(group);
    }
    let dummy_root = DocumentNode::new("DummyRoot")
        .with_child(leaf("hasValue", "1"))
        .with_child(DocumentNode::new("Name"))
        .with_child(DocumentNode::new("Dummies"))
        .with_child(leaf("Id", "1"))
        .with_child(group_list);

    let document = Document::from_elements(vec![
        dummy_root,
        leaf("IdCounter", &encoder.counter.to_string()),
        DocumentNode::new("SplineData"),
        DocumentNode::new("FeedbackDefinition")
            .with_child(configs)
            .with_child(leaf("ValidSequenceIDs", "CDATA[8 0 1]")),
    ]);

    log::info!(
        "Transcoded feedback document: {} ids, {} warning(s)",
        encoder.counter,
        encoder.warnings.len()
    );
    Ok(Transcoded {
        document,
        warnings: encoder.warnings,
        id_counter: encoder.counter,
    })
}
