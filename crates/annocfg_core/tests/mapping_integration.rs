//! Integration tests for the import/export pipeline
//!
//! These tests drive the public API end to end:
//! 1. Files on disk are imported into a scene and exported unchanged
//! 2. Scene edits land in exactly the fields they touch
//! 3. Structural rules block exports the game cannot read
//! 4. Families, subfiles and converters behave across files

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use annocfg_core::converter::{ProcessOutput, ProcessRunner};
use annocfg_core::{
    ConversionKind, ConverterGateway, ConverterTools, DocumentFormat, ExportOptions, ExportProblem,
    FeedbackFormat, ImportError, ImportOptions, Kind, Mapper, PathResolver, Properties, Scene,
    SceneKey, StructuralError, Vec3,
};

/// Stands in for the converter executables by writing the expected output
#[derive(Default)]
struct CopyRunner {
    calls: AtomicUsize,
}

impl CopyRunner {
    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessRunner for CopyRunner {
    fn run(&self, _program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input = args
            .iter()
            .map(PathBuf::from)
            .find(|p| p.extension().is_some() && p.exists())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no input argument"))?;
        let kind = ConversionKind::ALL
            .into_iter()
            .find(|k| k.accepts(&input))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unknown input"))?;
        fs::write(kind.output_path(&input), b"converted")?;
        Ok(ProcessOutput {
            success: true,
            code: Some(0),
            stderr: String::new(),
        })
    }
}

fn tools() -> ConverterTools {
    ConverterTools {
        rdm4: Some(PathBuf::from("rdm4-bin")),
        texconv: Some(PathBuf::from("texconv")),
        fc_converter: Some(PathBuf::from("AnnoFCConverter")),
    }
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("annocfg_it_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn plain_mapper() -> Mapper {
    Mapper::new(PathResolver::new(None, None))
}

fn child_of_kind(scene: &Scene, parent: SceneKey, kind: Kind) -> SceneKey {
    scene
        .children(parent)
        .iter()
        .copied()
        .find(|k| scene.get(*k).map(|n| n.kind()) == Some(kind))
        .expect("child of that kind")
}

// ==================== Round Trip Tests ====================

/// BOM, declaration and CRLF line endings survive an unedited round trip
#[test]
fn test_unedited_file_roundtrips_byte_identical() {
    let dir = scratch("bom");
    let cfg = dir.join("house.cfg");
    let text = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n<Config>\r\n\t<Models>\r\n\t\t<Config>\r\n\t\t\t<ConfigType>MODEL</ConfigType>\r\n\t\t\t<FileName>data/house/house.rdm</FileName>\r\n\t\t\t<Custom attr=\"x\">kept</Custom>\r\n\t\t</Config>\r\n\t</Models>\r\n\t<!-- unknown parts stay -->\r\n\t<Whatever />\r\n</Config>\r\n";
    fs::write(&cfg, text).unwrap();

    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let file = mapper.import_file(&mut scene, &cfg).unwrap();
    let report = mapper.export(&mut scene, file).unwrap();

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].text, text);

    fs::remove_file(&cfg).unwrap();
    mapper.write_report(&report).unwrap();
    assert_eq!(fs::read(&cfg).unwrap(), text.as_bytes());
    let _ = fs::remove_dir_all(&dir);
}

/// Moving a prop rewrites its position and leaves every other byte alone
#[test]
fn test_prop_move_changes_only_its_position() {
    let text = "<Config>\n\t<PropContainers>\n\t\t<Config>\n\t\t\t<ConfigType>PROPCONTAINER</ConfigType>\n\t\t\t<Props>\n\t\t\t\t<Config>\n\t\t\t\t\t<FileName>data/props/crate.prp</FileName>\n\t\t\t\t\t<Flags>1</Flags>\n\t\t\t\t\t<Position.x>1.000000</Position.x>\n\t\t\t\t\t<Position.y>0.000000</Position.y>\n\t\t\t\t\t<Position.z>2.000000</Position.z>\n\t\t\t\t\t<Rotation.x>0.000000</Rotation.x>\n\t\t\t\t\t<Rotation.y>0.000000</Rotation.y>\n\t\t\t\t\t<Rotation.z>0.000000</Rotation.z>\n\t\t\t\t\t<Rotation.w>1.000000</Rotation.w>\n\t\t\t\t\t<Scale.x>1.000000</Scale.x>\n\t\t\t\t\t<Scale.y>1.000000</Scale.y>\n\t\t\t\t\t<Scale.z>1.000000</Scale.z>\n\t\t\t\t</Config>\n\t\t\t</Props>\n\t\t</Config>\n\t</PropContainers>\n</Config>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let doc = DocumentFormat::Cfg.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Cfg, None).unwrap();

    let container = scene.children(file)[0];
    assert_eq!(scene.get(container).unwrap().kind(), Kind::PropContainer);
    let prop = scene.children(container)[0];
    assert_eq!(scene.get(prop).unwrap().kind(), Kind::Prop);

    let mut moved = *scene.get(prop).unwrap().transform();
    moved.position = moved.position + scene.convention().location_to_editor(Vec3::new(1.0, 0.0, 0.0));
    scene.set_transform(prop, moved).unwrap();

    let report = mapper.export(&mut scene, file).unwrap();
    let expected = text.replace(
        "<Position.x>1.000000</Position.x>",
        "<Position.x>2.000000</Position.x>",
    );
    assert_eq!(report.documents[0].text, expected);
}

/// Property edits rewrite only the edited fields; unmodelled siblings and
/// untouched material fields keep their text
#[test]
fn test_property_edits_keep_sibling_fields() {
    let text = "<Config>\n\t<Models>\n\t\t<Config>\n\t\t\t<ConfigType>MODEL</ConfigType>\n\t\t\t<FileName>data/a/hull.rdm</FileName>\n\t\t\t<IgnoreRuinState>1</IgnoreRuinState>\n\t\t\t<Materials>\n\t\t\t\t<Config>\n\t\t\t\t\t<ShaderID>8</ShaderID>\n\t\t\t\t\t<cModelDiffTex>data/a/hull_diff_0.psd</cModelDiffTex>\n\t\t\t\t\t<DIFFUSE_ENABLED>1</DIFFUSE_ENABLED>\n\t\t\t\t\t<cDiffuseColor.r>1</cDiffuseColor.r>\n\t\t\t\t\t<cDiffuseColor.g>1</cDiffuseColor.g>\n\t\t\t\t\t<cDiffuseColor.b>1</cDiffuseColor.b>\n\t\t\t\t</Config>\n\t\t\t</Materials>\n\t\t</Config>\n\t</Models>\n\t<Lights>\n\t\t<Config>\n\t\t\t<ConfigType>LIGHT</ConfigType>\n\t\t\t<Diffuse.r>1</Diffuse.r>\n\t\t\t<Diffuse.g>0.8</Diffuse.g>\n\t\t\t<Diffuse.b>0.6</Diffuse.b>\n\t\t\t<AttenuationRange>12</AttenuationRange>\n\t\t</Config>\n\t</Lights>\n</Config>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let doc = DocumentFormat::Cfg.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Cfg, None).unwrap();

    let model = child_of_kind(&scene, file, Kind::Model);
    let light = child_of_kind(&scene, file, Kind::Light);
    scene.properties_mut(model).unwrap().set_file_name("data/a/hull_v2.rdm");
    if let Some(Properties::Light { color }) = scene.properties_mut(light) {
        color[0] = 0.5;
    }

    let report = mapper.export(&mut scene, file).unwrap();
    let expected = text
        .replace("data/a/hull.rdm", "data/a/hull_v2.rdm")
        .replace("<Diffuse.r>1</Diffuse.r>", "<Diffuse.r>0.500000</Diffuse.r>");
    assert_eq!(report.documents[0].text, expected);
}

// ==================== Structural Rule Tests ====================

/// A scaled build blocker cannot be written back
#[test]
fn test_scaled_blocker_plane_is_rejected() {
    let text = "<Info>\n\t<BuildBlocker>\n\t\t<Position>\n\t\t\t<xf>-1</xf>\n\t\t\t<zf>-1</zf>\n\t\t</Position>\n\t\t<Position>\n\t\t\t<xf>1</xf>\n\t\t\t<zf>1</zf>\n\t\t</Position>\n\t</BuildBlocker>\n</Info>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let doc = DocumentFormat::Ifo.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Ifo, None).unwrap();

    let plane = scene.children(file)[0];
    assert_eq!(scene.get(plane).unwrap().kind(), Kind::BlockerPlane);
    scene.transform_mut(plane).unwrap().scale = Vec3::new(3.0, 3.0, 3.0);

    let err = mapper.export(&mut scene, file).unwrap_err();
    assert_eq!(err.problems.len(), 1);
    assert!(matches!(
        err.problems[0],
        ExportProblem::Structural(StructuralError::PlaneScaled { .. })
    ));
}

/// Particle track ids follow the particles when they are reordered
#[test]
fn test_particle_tracks_follow_reorder() {
    let text = "<Config>\n\t<Particles>\n\t\t<Config>\n\t\t\t<ConfigType>PARTICLE</ConfigType>\n\t\t\t<FileName>data/fx/smoke.rpx</FileName>\n\t\t</Config>\n\t\t<Config>\n\t\t\t<ConfigType>PARTICLE</ConfigType>\n\t\t\t<FileName>data/fx/spark.rpx</FileName>\n\t\t</Config>\n\t</Particles>\n\t<Sequences>\n\t\t<Config>\n\t\t\t<SequenceID>1000</SequenceID>\n\t\t\t<Track>\n\t\t\t\t<TrackElement>\n\t\t\t\t\t<ParticleID>1</ParticleID>\n\t\t\t\t</TrackElement>\n\t\t\t</Track>\n\t\t</Config>\n\t</Sequences>\n</Config>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let doc = DocumentFormat::Cfg.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Cfg, None).unwrap();

    assert!(scene.move_child(file, 1, 0));
    let report = mapper.export(&mut scene, file).unwrap();
    let out = &report.documents[0].text;

    assert!(out.contains("<ParticleID>0</ParticleID>"));
    assert!(out.find("spark.rpx").unwrap() < out.find("smoke.rpx").unwrap());
    assert!(report.warnings.is_empty());
}

/// `MaterialLODInfos` are dropped from every model when requested
#[test]
fn test_material_lod_infos_removed_everywhere() {
    let text = "<Config>\n\t<Models>\n\t\t<Config>\n\t\t\t<FileName>data/a/a.rdm</FileName>\n\t\t\t<MaterialLODInfos>\n\t\t\t\t<Config />\n\t\t\t</MaterialLODInfos>\n\t\t</Config>\n\t\t<Config>\n\t\t\t<FileName>data/a/b.rdm</FileName>\n\t\t\t<MaterialLODInfos />\n\t\t</Config>\n\t</Models>\n</Config>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper().with_export_options(ExportOptions {
        delete_material_lod_infos: true,
        ..ExportOptions::default()
    });
    let doc = DocumentFormat::Cfg.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Cfg, None).unwrap();

    let report = mapper.export(&mut scene, file).unwrap();
    let out = &report.documents[0].text;
    assert!(!out.contains("MaterialLODInfos"));
    assert!(out.contains("<FileName>data/a/a.rdm</FileName>"));
    assert!(out.contains("<FileName>data/a/b.rdm</FileName>"));
}

/// A feedback group numbered 0, 1, 3 is refused until the gap is closed
#[test]
fn test_feedback_group_gap_blocks_until_renamed() {
    let text = "<SimpleAnnoFeedbackEncoding>\n\t<DummyGroups>\n\t\t<DummyGroup>\n\t\t\t<Name>crew</Name>\n\t\t\t<Dummy><Name>crew_0</Name><Position><x>0</x><y>0</y><z>0</z></Position></Dummy>\n\t\t\t<Dummy><Name>crew_1</Name><Position><x>1</x><y>0</y><z>0</z></Position></Dummy>\n\t\t\t<Dummy><Name>crew_3</Name><Position><x>2</x><y>0</y><z>0</z></Position></Dummy>\n\t\t</DummyGroup>\n\t</DummyGroups>\n\t<FeedbackConfigs />\n</SimpleAnnoFeedbackEncoding>\n";
    let mut scene = Scene::default();
    let mut mapper = plain_mapper();
    let doc = DocumentFormat::Feedback.parse(text).unwrap();
    let file = mapper.import_document(&mut scene, doc, DocumentFormat::Feedback, None).unwrap();

    let err = mapper.export(&mut scene, file).unwrap_err();
    assert!(err.problems.iter().any(|p| matches!(
        p,
        ExportProblem::Structural(StructuralError::DummyGroupGap { group, .. }) if group == "crew"
    )));

    let group = child_of_kind(&scene, file, Kind::DummyGroup);
    let last = *scene.children(group).last().unwrap();
    if let Some(Properties::Dummy { name, .. }) = scene.properties_mut(last) {
        *name = "crew_2".to_string();
    }

    let report = mapper.export(&mut scene, file).unwrap();
    let cf7 = &report.documents[0];
    assert_eq!(cf7.format, DocumentFormat::Cf7);
    assert!(cf7.text.contains("<Name>crew_2</Name>"));
    assert!(!cf7.text.contains("crew_3"));
}

/// Subfiles that include each other are refused instead of recursing forever
#[test]
fn test_subfile_cycle_fails_import() {
    let dir = scratch("cycle");
    fs::create_dir_all(dir.join("data/loop")).unwrap();
    let include = |target: &str| {
        format!(
            "<Config>\n\t<Files>\n\t\t<Config>\n\t\t\t<ConfigType>FILE</ConfigType>\n\t\t\t<FileName>{}</FileName>\n\t\t</Config>\n\t</Files>\n</Config>\n",
            target
        )
    };
    fs::write(dir.join("data/loop/first.cfg"), include("data/loop/second.cfg")).unwrap();
    fs::write(dir.join("data/loop/second.cfg"), include("data/loop/first.cfg")).unwrap();

    let mut scene = Scene::default();
    let mut mapper = Mapper::new(PathResolver::new(Some(dir.clone()), None));
    let err = mapper
        .import_file(&mut scene, &dir.join("data/loop/first.cfg"))
        .unwrap_err();

    assert!(matches!(
        err,
        ImportError::Structural(StructuralError::CyclicSubfile { .. })
    ));
    assert!(scene.is_empty());
    let _ = fs::remove_dir_all(&dir);
}

// ==================== Family Tests ====================

/// A compact feedback companion is written back as a native `.cf7`
#[test]
fn test_compact_feedback_family_exports_cf7() {
    let dir = scratch("feedback");
    let cfg = dir.join("ship.cfg");
    fs::write(&cfg, "<Config>\n\t<Models />\n</Config>\n").unwrap();
    fs::write(
        dir.join("ship.xml"),
        "<SimpleAnnoFeedbackEncoding>\n\t<DummyGroups>\n\t\t<DummyGroup>\n\t\t\t<Name>deck</Name>\n\t\t\t<Dummy><Name>deck_0</Name><Position><x>0</x><y>1</y><z>0</z></Position></Dummy>\n\t\t\t<Dummy><Name>deck_1</Name><Position><x>2</x><y>1</y><z>0</z></Position></Dummy>\n\t\t</DummyGroup>\n\t</DummyGroups>\n\t<FeedbackConfigs />\n</SimpleAnnoFeedbackEncoding>\n",
    )
    .unwrap();

    let mut scene = Scene::default();
    let mut mapper = plain_mapper().with_import_options(ImportOptions {
        feedback_format: FeedbackFormat::Compact,
        ..ImportOptions::default()
    });
    let root = mapper.import_family(&mut scene, &cfg).unwrap();
    let report = mapper.export(&mut scene, root).unwrap();
    assert_eq!(report.documents.len(), 2);

    let cf7_path = dir.join("ship.cf7");
    let cf7 = report.document(&cf7_path).expect("cf7 document");
    assert_eq!(cf7.format, DocumentFormat::Cf7);
    assert!(cf7.text.contains("deck_1"));

    mapper.write_report(&report).unwrap();
    assert!(fs::read_to_string(&cf7_path).unwrap().starts_with("<DummyRoot>"));
    let _ = fs::remove_dir_all(&dir);
}

// ==================== Converter and Path Tests ====================

/// A second conversion of an unchanged input does not start the tool
#[test]
fn test_conversion_is_cached() {
    let dir = scratch("cache");
    let mesh = dir.join("hull.rdm");
    fs::write(&mesh, b"mesh").unwrap();

    let runner = Arc::new(CopyRunner::default());
    let gateway = ConverterGateway::with_runner(tools(), runner.clone());

    let first = gateway.convert(ConversionKind::MeshToInterchange, &mesh).unwrap();
    let second = gateway.convert(ConversionKind::MeshToInterchange, &mesh).unwrap();

    assert_eq!(first, dir.join("hull.glb"));
    assert_eq!(first, second);
    assert_eq!(runner.count(), 1);
    let _ = fs::remove_dir_all(&dir);
}

/// Files in the mod root shadow the base game files
#[test]
fn test_mod_root_takes_priority() {
    let dir = scratch("roots");
    let base = dir.join("base");
    let modded = dir.join("mod");
    for root in [&base, &modded] {
        fs::create_dir_all(root.join("data/ship")).unwrap();
        fs::write(root.join("data/ship/hull.rdm"), b"mesh").unwrap();
    }
    fs::write(base.join("data/ship/mast.rdm"), b"mesh").unwrap();

    let resolver = PathResolver::new(Some(base.clone()), Some(modded.clone()));
    assert_eq!(
        resolver.to_absolute("data/ship/hull.rdm").unwrap(),
        modded.join("data/ship/hull.rdm")
    );
    assert_eq!(
        resolver.to_absolute("data/ship/mast.rdm").unwrap(),
        base.join("data/ship/mast.rdm")
    );
    assert_eq!(
        resolver.to_canonical(&modded.join("data/ship/hull.rdm")).unwrap(),
        "data/ship/hull.rdm"
    );
    assert!(resolver.to_absolute("data/ship/sail.rdm").is_err());
    let _ = fs::remove_dir_all(&dir);
}
