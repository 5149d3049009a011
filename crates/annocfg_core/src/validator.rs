//! Scene validation
//!
//! Checks a subtree for edits the game files cannot express before anything
//! is written. The [`SceneValidator`] reports two tiers:
//!
//! - problems ([`StructuralError`]) block an export: scaled planes,
//!   non-uniform scale where only uniform is stored, duplicate or
//!   misnumbered dummies
//! - warnings ([`ValidationWarning`]) are carried into the export report:
//!   empty asset paths, placeholder nodes

use std::collections::HashSet;

use crate::error::{StructuralError, ValidationWarning};
use crate::feedback::check_group_naming;
use crate::registry::{DocumentFormat, Kind, Registry, ScaleRule};
use crate::scene::{check_scale, DirtyFlags, Scene, SceneKey};

/// Findings for one subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub problems: Vec<StructuralError>,
    pub warnings: Vec<ValidationWarning>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Static checks over a scene subtree
///
/// # Example
/// ```ignore
/// let found = SceneValidator::validate(&scene, file);
/// for problem in &found.problems {
///     eprintln!("cannot export: {}", problem);
/// }
/// ```
pub struct SceneValidator;

impl SceneValidator {
    /// Validate `root` and everything below it
    pub fn validate(scene: &Scene, root: SceneKey) -> Validation {
        let mut found = Validation::default();

        for key in scene.descendants(root) {
            let Some(node) = scene.get(key) else {
                continue;
            };

            let placed = Registry::placement(node.kind()).scale != ScaleRule::None;
            if placed && node.dirty().contains(DirtyFlags::TRANSFORM) {
                if let Err(problem) = check_scale(node.kind(), node.name(), node.transform()) {
                    found.problems.push(problem);
                }
            }

            if node.kind() == Kind::DummyGroup {
                found.problems.extend(check_dummy_group(scene, key));
            }

            if node.kind().references_asset() && node.properties().file_name() == Some("") {
                found
                    .warnings
                    .push(ValidationWarning::new(node.name(), "empty FileName"));
            }
            if node.is_placeholder() {
                found.warnings.push(ValidationWarning::new(
                    node.name(),
                    "placeholder for a missing asset; written back unchanged",
                ));
            }
        }

        found
    }

    /// `Ok` with the warnings if nothing blocks an export
    ///
    /// # Errors
    /// Returns every problem found.
    pub fn validate_or_error(scene: &Scene, root: SceneKey) -> Result<Vec<ValidationWarning>, Vec<StructuralError>> {
        let found = Self::validate(scene, root);
        if found.is_ok() {
            Ok(found.warnings)
        } else {
            Err(found.problems)
        }
    }

    /// Everything as warnings, for inspection tools
    pub fn lint(scene: &Scene, root: SceneKey) -> Vec<ValidationWarning> {
        let found = Self::validate(scene, root);
        found
            .problems
            .into_iter()
            .map(|p| ValidationWarning::new("", p.to_string()))
            .chain(found.warnings)
            .collect()
    }
}

fn check_dummy_group(scene: &Scene, group: SceneKey) -> Vec<StructuralError> {
    let Some(node) = scene.get(group) else {
        return Vec::new();
    };
    let group_name = node.properties().name().unwrap_or_else(|| node.name()).to_string();
    let names: Vec<&str> = scene
        .children(group)
        .iter()
        .filter_map(|c| scene.get(*c))
        .filter(|c| c.kind() == Kind::Dummy)
        .map(|c| c.properties().name().unwrap_or_else(|| c.name()))
        .collect();

    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(*name) {
            problems.push(StructuralError::DuplicateDummy {
                group: group_name.clone(),
                name: name.to_string(),
            });
        }
    }
    if problems.is_empty() && node.format() == DocumentFormat::Feedback {
        if let Err(problem) = check_group_naming(&group_name, &names) {
            problems.push(problem);
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentNode;
    use crate::properties::Properties;
    use crate::scene::SceneNode;
    use crate::transform::Transform;
    use annocfg_math::Vec3;

    fn file(scene: &mut Scene, format: DocumentFormat) -> SceneKey {
        scene.add_root(SceneNode::new(Kind::File, format, DocumentNode::default()))
    }

    fn dummy(scene: &mut Scene, group: SceneKey, format: DocumentFormat, name: &str) -> SceneKey {
        let node = SceneNode::new(Kind::Dummy, format, DocumentNode::new("Dummy"))
            .with_name(name)
            .with_properties(Properties::Dummy {
                name: name.to_string(),
                height_adaptation_mode: None,
            });
        scene.add_child(group, node).unwrap()
    }

    fn group(scene: &mut Scene, parent: SceneKey, format: DocumentFormat, name: &str) -> SceneKey {
        let node = SceneNode::new(Kind::DummyGroup, format, DocumentNode::new("DummyGroup"))
            .with_name(name)
            .with_properties(Properties::DummyGroup { name: name.to_string() });
        scene.add_child(parent, node).unwrap()
    }

    #[test]
    fn test_clean_scene_has_no_findings() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Feedback);
        let g = group(&mut scene, root, DocumentFormat::Feedback, "walk");
        dummy(&mut scene, g, DocumentFormat::Feedback, "walk_0");
        dummy(&mut scene, g, DocumentFormat::Feedback, "walk_1");
        let found = SceneValidator::validate(&scene, root);
        assert_eq!(found, Validation::default());
        assert!(SceneValidator::validate_or_error(&scene, root).is_ok());
    }

    #[test]
    fn test_scaled_plane_is_a_problem() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Ifo);
        let plane = scene
            .add_child(
                root,
                SceneNode::new(Kind::BlockerPlane, DocumentFormat::Ifo, DocumentNode::new("BuildBlocker"))
                    .with_name("BuildBlocker"),
            )
            .unwrap();
        scene.transform_mut(plane).unwrap().scale = Vec3::new(2.0, 1.0, 1.0);
        let problems = SceneValidator::validate_or_error(&scene, root).unwrap_err();
        assert_eq!(
            problems,
            vec![StructuralError::PlaneScaled {
                node: "BuildBlocker".to_string()
            }]
        );
    }

    #[test]
    fn test_untouched_transform_is_not_checked() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Cfg);
        let mut transform = Transform::identity();
        transform.scale = Vec3::new(1.0, 2.0, 1.0);
        scene.add_child(
            root,
            SceneNode::new(Kind::Model, DocumentFormat::Cfg, DocumentNode::new("Config"))
                .with_transform(transform)
                .with_properties(Properties::Asset(Default::default())),
        );
        let found = SceneValidator::validate(&scene, root);
        assert!(found.is_ok());
        assert_eq!(found.warnings.len(), 1);
        assert_eq!(found.warnings[0].message, "empty FileName");
    }

    #[test]
    fn test_duplicate_dummy_names() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Cf7);
        let g = group(&mut scene, root, DocumentFormat::Cf7, "group");
        dummy(&mut scene, g, DocumentFormat::Cf7, "a");
        dummy(&mut scene, g, DocumentFormat::Cf7, "a");
        let found = SceneValidator::validate(&scene, root);
        assert_eq!(
            found.problems,
            vec![StructuralError::DuplicateDummy {
                group: "group".to_string(),
                name: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_feedback_group_numbering_gap() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Feedback);
        let g = group(&mut scene, root, DocumentFormat::Feedback, "walk");
        dummy(&mut scene, g, DocumentFormat::Feedback, "walk_0");
        dummy(&mut scene, g, DocumentFormat::Feedback, "walk_2");
        let found = SceneValidator::validate(&scene, root);
        assert_eq!(found.problems.len(), 1);
        assert!(matches!(found.problems[0], StructuralError::DummyGroupGap { .. }));
    }

    #[test]
    fn test_created_node_without_placement_passes() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Feedback);
        scene.create(root, Kind::FeedbackConfig).unwrap();
        assert!(SceneValidator::validate(&scene, root).is_ok());
    }

    #[test]
    fn test_lint_turns_problems_into_warnings() {
        let mut scene = Scene::default();
        let root = file(&mut scene, DocumentFormat::Cf7);
        let g = group(&mut scene, root, DocumentFormat::Cf7, "g");
        dummy(&mut scene, g, DocumentFormat::Cf7, "x");
        dummy(&mut scene, g, DocumentFormat::Cf7, "x");
        let lint = SceneValidator::lint(&scene, root);
        assert_eq!(lint.len(), 1);
        assert!(lint[0].message.contains("duplicate dummy name 'x'"));
    }
}
