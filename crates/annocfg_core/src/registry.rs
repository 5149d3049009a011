//! Node types and how they are found and placed
//!
//! The registry is a static dispatch table. Given the kind of a parent node
//! and the format of the document it lives in, [`Registry::child_rules`]
//! lists the containers and tags whose elements become child scene nodes.
//! [`Registry::placement`] says where a kind keeps its transform and which
//! scale constraint applies.

use std::fmt;
use std::path::Path;

use crate::document::{Document, DocumentNode};
use crate::feedback::sequences;

/// Transformer block shared by most `.cfg` entries
pub const ORIENTATION_TRANSFORM: &str = "Transformer/Config[ConfigType='ORIENTATION_TRANSFORM']";

/// Document type of a file in the family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Main object tree
    Cfg,
    /// Physical blockers
    Ifo,
    /// Dummies and animation data, several top-level elements
    Cf7,
    /// Compact feedback encoding (`.xml`)
    Feedback,
}

impl DocumentFormat {
    /// Format from a file extension (`.fc` needs a conversion first)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "cfg" => Some(DocumentFormat::Cfg),
            "ifo" => Some(DocumentFormat::Ifo),
            "cf7" => Some(DocumentFormat::Cf7),
            "xml" => Some(DocumentFormat::Feedback),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Cfg => "cfg",
            DocumentFormat::Ifo => "ifo",
            DocumentFormat::Cf7 => "cf7",
            DocumentFormat::Feedback => "xml",
        }
    }

    /// Documents of this format may hold several top-level elements
    pub fn is_fragment(self) -> bool {
        matches!(self, DocumentFormat::Cf7)
    }

    /// Parse text in this format
    pub fn parse(self, text: &str) -> Result<Document, crate::error::FormatError> {
        if self.is_fragment() {
            Document::parse_fragment(text)
        } else {
            Document::parse(text)
        }
    }
}

/// What a scene node represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    File,
    Model,
    Cloth,
    PropContainer,
    Prop,
    Particle,
    Light,
    Decal,
    Subfile,
    Animation,
    AnimationSequence,
    BlockerCube,
    BlockerPlane,
    BlockerEmpty,
    DummyGroup,
    Dummy,
    Spline,
    FeedbackConfig,
    FeedbackSequenceElement,
    Unknown,
}

impl Kind {
    /// Upper-case label used in display names when a node has no ConfigType
    pub fn label(self) -> &'static str {
        match self {
            Kind::File => "FILE",
            Kind::Model => "MODEL",
            Kind::Cloth => "CLOTH",
            Kind::PropContainer => "PROPCONTAINER",
            Kind::Prop => "PROP",
            Kind::Particle => "PARTICLE",
            Kind::Light => "LIGHT",
            Kind::Decal => "DECAL",
            Kind::Subfile => "FILE",
            Kind::Animation => "ANIMATION",
            Kind::AnimationSequence => "SEQUENCE",
            Kind::BlockerCube => "CUBE",
            Kind::BlockerPlane => "PLANE",
            Kind::BlockerEmpty => "EMPTY",
            Kind::DummyGroup => "DummyGroup",
            Kind::Dummy => "Dummy",
            Kind::Spline => "SPLINE",
            Kind::FeedbackConfig => "FeedbackConfig",
            Kind::FeedbackSequenceElement => "SequenceElement",
            Kind::Unknown => "UNKNOWN",
        }
    }

    /// Kinds whose `FileName` references an asset that must resolve under a root
    pub fn references_asset(self) -> bool {
        matches!(
            self,
            Kind::Model | Kind::Cloth | Kind::Prop | Kind::Particle | Kind::Subfile
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Where child elements of a given kind are found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildRule {
    /// Path of the container element; `None` for direct children
    pub container: Option<&'static str>,
    /// Required tag; `None` accepts any element
    pub tag: Option<&'static str>,
    pub kind: Kind,
}

impl ChildRule {
    const fn new(container: Option<&'static str>, tag: Option<&'static str>, kind: Kind) -> Self {
        Self { container, tag, kind }
    }

    pub fn matches(&self, container: Option<&str>, tag: &str) -> bool {
        self.container == container && self.tag.map(|t| t == tag).unwrap_or(true)
    }
}

const fn any(container: &'static str, kind: Kind) -> ChildRule {
    ChildRule::new(Some(container), None, kind)
}

const fn tagged(container: &'static str, tag: &'static str, kind: Kind) -> ChildRule {
    ChildRule::new(Some(container), Some(tag), kind)
}

const fn direct(tag: &'static str, kind: Kind) -> ChildRule {
    ChildRule::new(None, Some(tag), kind)
}

static CFG_ROOT: &[ChildRule] = &[
    any("Models", Kind::Model),
    any("Clothes", Kind::Cloth),
    any("Files", Kind::Subfile),
    any("PropContainers", Kind::PropContainer),
    any("Particles", Kind::Particle),
    any("Lights", Kind::Light),
    any("Decals", Kind::Decal),
    tagged("Sequences", "Config", Kind::AnimationSequence),
];

static MODEL: &[ChildRule] = &[any("Animations", Kind::Animation)];

static PROP_CONTAINER: &[ChildRule] = &[any("Props", Kind::Prop)];

static IFO_ROOT: &[ChildRule] = &[
    direct("BoundingBox", Kind::BlockerCube),
    direct("MeshBoundingBox", Kind::BlockerCube),
    direct("IntersectBox", Kind::BlockerCube),
    direct("Dummy", Kind::BlockerCube),
    direct("BuildBlocker", Kind::BlockerPlane),
    direct("WaterBlocker", Kind::BlockerPlane),
    direct("FeedbackBlocker", Kind::BlockerPlane),
    direct("PriorityFeedbackBlocker", Kind::BlockerPlane),
    direct("UnevenBlocker", Kind::BlockerPlane),
    direct("QuayArea", Kind::BlockerPlane),
    direct("InvisibleQuayArea", Kind::BlockerPlane),
    direct("Sequence", Kind::BlockerEmpty),
    direct("MeshHeightmap", Kind::BlockerEmpty),
    ChildRule::new(None, None, Kind::Unknown),
];

static CF7_TOP: &[ChildRule] = &[
    tagged("DummyRoot/Groups", "i", Kind::DummyGroup),
    tagged("SplineData", "v", Kind::Spline),
];

static CF7_GROUP: &[ChildRule] = &[tagged("Dummies", "i", Kind::Dummy)];

static FEEDBACK_ROOT: &[ChildRule] = &[
    tagged("DummyGroups", "DummyGroup", Kind::DummyGroup),
    tagged("FeedbackConfigs", "FeedbackConfig", Kind::FeedbackConfig),
];

static FEEDBACK_GROUP: &[ChildRule] = &[direct("Dummy", Kind::Dummy)];

static FEEDBACK_CONFIG: &[ChildRule] = &[any("SequenceElements", Kind::FeedbackSequenceElement)];

/// Scale constraint of a kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleRule {
    /// Kind has no scale
    None,
    /// x, y and z must be equal
    Uniform,
    NonUniform,
    /// Any scale other than identity is rejected
    Forbidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationBinding {
    None,
    /// Field paths of the x, y, z, w components
    Quaternion([&'static str; 4]),
    /// Single angle about the game's up axis
    Yaw(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleBinding {
    None,
    /// One field applied to all axes
    Uniform(&'static str),
    PerAxis([&'static str; 3]),
}

/// Field paths of a node's transform, relative to the node element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformBinding {
    pub position: [&'static str; 3],
    pub rotation: RotationBinding,
    pub scale: ScaleBinding,
}

/// How a kind is placed in space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementRule {
    pub transform: Option<TransformBinding>,
    pub scale: ScaleRule,
    /// Shape is a list of `Position/{xf,zf}` vertices
    pub vertices: bool,
}

macro_rules! oriented {
    ($field:literal) => {
        concat!("Transformer/Config[ConfigType='ORIENTATION_TRANSFORM']/", $field)
    };
}

const ORIENTED_POSITION: [&str; 3] = [
    oriented!("Position.x"),
    oriented!("Position.y"),
    oriented!("Position.z"),
];
const ORIENTED_ROTATION: RotationBinding = RotationBinding::Quaternion([
    oriented!("Rotation.x"),
    oriented!("Rotation.y"),
    oriented!("Rotation.z"),
    oriented!("Rotation.w"),
]);

const ORIENTED_UNIFORM: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ORIENTED_POSITION,
        rotation: ORIENTED_ROTATION,
        scale: ScaleBinding::Uniform(oriented!("Scale")),
    }),
    scale: ScaleRule::Uniform,
    vertices: false,
};

const PROP_CONTAINER_PLACEMENT: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ORIENTED_POSITION,
        rotation: ORIENTED_ROTATION,
        scale: ScaleBinding::PerAxis([oriented!("Scale.x"), oriented!("Scale.y"), oriented!("Scale.z")]),
    }),
    scale: ScaleRule::Uniform,
    vertices: false,
};

const PROP_PLACEMENT: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ["Position.x", "Position.y", "Position.z"],
        rotation: RotationBinding::Quaternion(["Rotation.x", "Rotation.y", "Rotation.z", "Rotation.w"]),
        scale: ScaleBinding::PerAxis(["Scale.x", "Scale.y", "Scale.z"]),
    }),
    scale: ScaleRule::NonUniform,
    vertices: false,
};

const DECAL_PLACEMENT: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ORIENTED_POSITION,
        rotation: ORIENTED_ROTATION,
        scale: ScaleBinding::PerAxis(["Extents.x", "Extents.y", "Extents.z"]),
    }),
    scale: ScaleRule::NonUniform,
    vertices: false,
};

const CUBE_PLACEMENT: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ["Position/xf", "Position/yf", "Position/zf"],
        rotation: RotationBinding::Quaternion(["Rotation/xf", "Rotation/yf", "Rotation/zf", "Rotation/wf"]),
        scale: ScaleBinding::PerAxis(["Extents/xf", "Extents/yf", "Extents/zf"]),
    }),
    scale: ScaleRule::NonUniform,
    vertices: false,
};

const DUMMY_PLACEMENT: PlacementRule = PlacementRule {
    transform: Some(TransformBinding {
        position: ["Position/x", "Position/y", "Position/z"],
        rotation: RotationBinding::Yaw("RotationY"),
        scale: ScaleBinding::PerAxis(["Extents/x", "Extents/y", "Extents/z"]),
    }),
    scale: ScaleRule::NonUniform,
    vertices: false,
};

const PLANE_PLACEMENT: PlacementRule = PlacementRule {
    transform: None,
    scale: ScaleRule::Forbidden,
    vertices: true,
};

const NO_PLACEMENT: PlacementRule = PlacementRule {
    transform: None,
    scale: ScaleRule::None,
    vertices: false,
};

/// Static lookup tables
pub struct Registry;

impl Registry {
    /// Rules for the children of a `parent` node inside a `format` document
    pub fn child_rules(parent: Kind, format: DocumentFormat) -> &'static [ChildRule] {
        match (parent, format) {
            (Kind::File, DocumentFormat::Cfg) => CFG_ROOT,
            (Kind::File, DocumentFormat::Ifo) => IFO_ROOT,
            (Kind::File, DocumentFormat::Cf7) => CF7_TOP,
            (Kind::File, DocumentFormat::Feedback) => FEEDBACK_ROOT,
            (Kind::Model, DocumentFormat::Cfg) => MODEL,
            (Kind::PropContainer, DocumentFormat::Cfg) => PROP_CONTAINER,
            (Kind::DummyGroup, DocumentFormat::Cf7) => CF7_GROUP,
            (Kind::DummyGroup, DocumentFormat::Feedback) => FEEDBACK_GROUP,
            (Kind::FeedbackConfig, DocumentFormat::Feedback) => FEEDBACK_CONFIG,
            _ => &[],
        }
    }

    /// Distinct containers of `child_rules`, in table order
    pub fn containers(parent: Kind, format: DocumentFormat) -> Vec<Option<&'static str>> {
        let mut out: Vec<Option<&'static str>> = Vec::new();
        for rule in Self::child_rules(parent, format) {
            if !out.contains(&rule.container) {
                out.push(rule.container);
            }
        }
        out
    }

    /// Kind of a `tag` element found in `container` below a `parent` node
    pub fn classify(
        parent: Kind,
        format: DocumentFormat,
        container: Option<&str>,
        tag: &str,
    ) -> Option<Kind> {
        Self::child_rules(parent, format)
            .iter()
            .find(|rule| rule.matches(container, tag))
            .map(|rule| rule.kind)
    }

    /// Default container for a new child of `kind` below `parent`
    pub fn container_for(parent: Kind, format: DocumentFormat, kind: Kind) -> Option<&'static str> {
        Self::child_rules(parent, format)
            .iter()
            .find(|rule| rule.kind == kind)
            .and_then(|rule| rule.container)
    }

    pub fn placement(kind: Kind) -> PlacementRule {
        match kind {
            Kind::Model | Kind::Cloth | Kind::Subfile | Kind::Particle | Kind::Light => {
                ORIENTED_UNIFORM
            }
            Kind::PropContainer => PROP_CONTAINER_PLACEMENT,
            Kind::Prop => PROP_PLACEMENT,
            Kind::Decal => DECAL_PLACEMENT,
            Kind::BlockerCube => CUBE_PLACEMENT,
            Kind::Dummy => DUMMY_PLACEMENT,
            Kind::BlockerPlane => PLANE_PLACEMENT,
            _ => NO_PLACEMENT,
        }
    }

    /// Default element for a new node of `kind` in a `format` document
    pub fn template(kind: Kind, format: DocumentFormat) -> Option<DocumentNode> {
        let text = match (kind, format) {
            (Kind::Model, _) => "<Config><ConfigType>MODEL</ConfigType><FileName></FileName><Name></Name><Materials></Materials></Config>",
            (Kind::Cloth, _) => "<Config><ConfigType>CLOTH</ConfigType><FileName></FileName><Name></Name><Materials></Materials></Config>",
            (Kind::Prop, _) => "<Config><ConfigType>PROP</ConfigType><FileName></FileName><Name></Name><Flags>1</Flags></Config>",
            (Kind::PropContainer, _) => "<Config><ConfigType>PROPCONTAINER</ConfigType><Name></Name><Props></Props></Config>",
            (Kind::Particle, _) => "<Config><ConfigType>PARTICLE</ConfigType><FileName></FileName><Name></Name></Config>",
            (Kind::Light, _) => "<Config><ConfigType>LIGHT</ConfigType><Name></Name><Diffuse.r>1.000000</Diffuse.r><Diffuse.g>1.000000</Diffuse.g><Diffuse.b>1.000000</Diffuse.b></Config>",
            (Kind::Subfile, _) => "<Config><FileName></FileName><ConfigType>FILE</ConfigType><Transformer><Config><ConfigType>ORIENTATION_TRANSFORM</ConfigType><Conditions>0</Conditions></Config></Transformer></Config>",
            (Kind::BlockerCube, _) => "<BoundingBox><Position><xf>0.000000</xf><yf>0.000000</yf><zf>0.000000</zf></Position><Rotation><xf>0.000000</xf><yf>0.000000</yf><zf>0.000000</zf><wf>1.000000</wf></Rotation><Extents><xf>1.000000</xf><yf>1.000000</yf><zf>1.000000</zf></Extents></BoundingBox>",
            (Kind::BlockerPlane, _) => "<BuildBlocker></BuildBlocker>",
            (Kind::Dummy, DocumentFormat::Cf7) => "<i><hasValue>1</hasValue><Name></Name><HeightAdaptationMode>1</HeightAdaptationMode><Extents><x>0.1</x><y>0.1</y><z>0.1</z></Extents></i>",
            (Kind::Dummy, _) => "<Dummy><Name></Name><HeightAdaptationMode>1</HeightAdaptationMode><Extents><x>0.1</x><y>0.1</y><z>0.1</z></Extents></Dummy>",
            (Kind::DummyGroup, DocumentFormat::Cf7) => "<i><hasValue>1</hasValue><Name></Name><Groups></Groups><Dummies></Dummies></i>",
            (Kind::DummyGroup, _) => "<DummyGroup><Name></Name></DummyGroup>",
            (Kind::FeedbackConfig, _) => "<FeedbackConfig><GUIDVariationList></GUIDVariationList><SequenceElements></SequenceElements></FeedbackConfig>",
            (Kind::FeedbackSequenceElement, _) => "<IdleAnimation><m_IdleSequenceID>idle01</m_IdleSequenceID><MinPlayCount>1</MinPlayCount><MaxPlayCount>1</MaxPlayCount></IdleAnimation>",
            _ => return None,
        };
        let mut node = Document::parse(text).ok()?.root()?.clone();
        node.strip_whitespace();
        Some(node)
    }

    /// Display name `<ConfigType or tag>_<Name or file stem>`
    ///
    /// `ordinal` is the element's position among its container siblings;
    /// only animations use it.
    pub fn display_name(kind: Kind, element: &DocumentNode, ordinal: usize) -> String {
        match kind {
            Kind::Animation => {
                let stem = file_stem(&element.field("FileName").unwrap_or_default());
                return format!("ANIMATION_{}_{}", ordinal, stem);
            }
            Kind::AnimationSequence => {
                let id = element
                    .field("SequenceID")
                    .and_then(|t| t.trim().parse::<i64>().ok())
                    .unwrap_or(-1);
                return match sequences::sequence_name(id) {
                    Some(name) => format!("SEQUENCE_{}", name),
                    None => format!("SEQUENCE_{}", id),
                };
            }
            _ => {}
        }
        let prefix = match element.field("ConfigType") {
            Some(config_type) if !config_type.is_empty() => config_type,
            _ if matches!(element.name(), "i" | "Config" | "v") => kind.label().to_string(),
            _ => element.name().to_string(),
        };
        let stem = element
            .field("FileName")
            .map(|f| file_stem(&f))
            .unwrap_or_default();
        let name = element
            .field("Name")
            .filter(|n| !n.is_empty())
            .unwrap_or(stem);
        if name.is_empty() {
            prefix
        } else if name.starts_with(&format!("{}_", prefix)) {
            name
        } else {
            format!("{}_{}", prefix, name)
        }
    }

    /// Game-side name from a display name (text after the first `_`)
    pub fn name_from_display(display: &str) -> &str {
        display.split_once('_').map(|(_, rest)| rest).unwrap_or(display)
    }
}

fn file_stem(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 => file[..dot].to_string(),
        _ => file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_cfg_root() {
        let kind = Registry::classify(Kind::File, DocumentFormat::Cfg, Some("Models"), "Config");
        assert_eq!(kind, Some(Kind::Model));
        let seq = Registry::classify(Kind::File, DocumentFormat::Cfg, Some("Sequences"), "Track");
        assert_eq!(seq, None);
    }

    #[test]
    fn test_classify_ifo() {
        let classify = |tag| Registry::classify(Kind::File, DocumentFormat::Ifo, None, tag);
        assert_eq!(classify("IntersectBox"), Some(Kind::BlockerCube));
        assert_eq!(classify("QuayArea"), Some(Kind::BlockerPlane));
        assert_eq!(classify("MeshHeightmap"), Some(Kind::BlockerEmpty));
        assert_eq!(classify("SomethingNew"), Some(Kind::Unknown));
    }

    #[test]
    fn test_dummy_context_depends_on_format() {
        assert_eq!(
            Registry::classify(Kind::DummyGroup, DocumentFormat::Cf7, Some("Dummies"), "i"),
            Some(Kind::Dummy)
        );
        assert_eq!(
            Registry::classify(Kind::DummyGroup, DocumentFormat::Feedback, None, "Dummy"),
            Some(Kind::Dummy)
        );
    }

    #[test]
    fn test_containers_in_order() {
        let containers = Registry::containers(Kind::File, DocumentFormat::Cf7);
        assert_eq!(containers, vec![Some("DummyRoot/Groups"), Some("SplineData")]);
        assert_eq!(Registry::containers(Kind::File, DocumentFormat::Ifo), vec![None]);
    }

    #[test]
    fn test_placement_scale_rules() {
        assert_eq!(Registry::placement(Kind::Model).scale, ScaleRule::Uniform);
        assert_eq!(Registry::placement(Kind::PropContainer).scale, ScaleRule::Uniform);
        assert_eq!(Registry::placement(Kind::Prop).scale, ScaleRule::NonUniform);
        assert_eq!(Registry::placement(Kind::BlockerPlane).scale, ScaleRule::Forbidden);
        assert!(Registry::placement(Kind::BlockerPlane).vertices);
        assert!(Registry::placement(Kind::FeedbackConfig).transform.is_none());
    }

    #[test]
    fn test_dummy_template() {
        let node = Registry::template(Kind::Dummy, DocumentFormat::Feedback).unwrap();
        assert_eq!(node.name(), "Dummy");
        assert_eq!(node.field("HeightAdaptationMode").as_deref(), Some("1"));
        assert_eq!(node.field("Extents/y").as_deref(), Some("0.1"));
    }

    #[test]
    fn test_display_name() {
        let doc = Document::parse(
            "<Config><ConfigType>MODEL</ConfigType><FileName>data/a/ship_lod0.rdm</FileName></Config>",
        )
        .unwrap();
        assert_eq!(
            Registry::display_name(Kind::Model, doc.root().unwrap(), 0),
            "MODEL_ship_lod0"
        );

        let dummy = Document::parse("<i><Name>walk_0</Name></i>").unwrap();
        assert_eq!(Registry::display_name(Kind::Dummy, dummy.root().unwrap(), 0), "Dummy_walk_0");
        assert_eq!(Registry::name_from_display("Dummy_walk_0"), "walk_0");
    }

    #[test]
    fn test_animation_and_sequence_names() {
        let anim = Document::parse("<Config><FileName>data/anims/walk.rdm</FileName></Config>").unwrap();
        assert_eq!(
            Registry::display_name(Kind::Animation, anim.root().unwrap(), 2),
            "ANIMATION_2_walk"
        );
        let seq = Document::parse("<Config><SequenceID>1000</SequenceID></Config>").unwrap();
        assert_eq!(
            Registry::display_name(Kind::AnimationSequence, seq.root().unwrap(), 0),
            "SEQUENCE_idle01"
        );
        let unknown = Document::parse("<Config><SequenceID>77</SequenceID></Config>").unwrap();
        assert_eq!(
            Registry::display_name(Kind::AnimationSequence, unknown.root().unwrap(), 0),
            "SEQUENCE_77"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.CFG")), Some(DocumentFormat::Cfg));
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.fc")), None);
        assert!(DocumentFormat::Cf7.is_fragment());
    }
}
