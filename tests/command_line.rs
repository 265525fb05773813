use std::fs;

use ctaprod::cwl::{
    CommandLineSynthesizer, FakeFileStager, InputDocument, InputResolver, ToolDescription,
};
use ctaprod::error::{CwlError, StagingError, StepError};
use tempfile::TempDir;

fn synthesize(tool: &str, inputs: &str, stager: &FakeFileStager) -> Result<String, StepError> {
    let tool = ToolDescription::from_yaml_str(tool).expect("Failed to parse tool");
    let doc = InputDocument::from_yaml_str(inputs).expect("Failed to parse inputs");
    let resolved = InputResolver::resolve(&tool, &doc)?;
    CommandLineSynthesizer::new(stager).synthesize(&tool, &resolved)
}

/// Every regular file below `root`.
fn files_under(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

#[test]
fn test_binding_order_follows_position_not_document() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    let tool = r#"
class: CommandLineTool
baseCommand: [tool, sub]
arguments:
  - valueFrom: --late
    position: 5
  - --first
inputs:
  zeta:
    type: string
    inputBinding: {position: 1, prefix: -z}
  alpha:
    type: string
    inputBinding: {position: 1, prefix: -a}
  early:
    type: int
    inputBinding: {position: -1}
  unbound: string
"#;
    let inputs = "unbound: x\nzeta: Z\nearly: 3\nalpha: A\n";

    let cmd = synthesize(tool, inputs, &stager).unwrap();
    // Ties on position: arguments first, then inputs by id.
    assert_eq!(cmd, "tool sub 3 --first -a A -z Z --late");
}

#[test]
fn test_rendering_rules() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    let tool = r#"
class: CommandLineTool
baseCommand: render
inputs:
  verbose: {type: boolean, inputBinding: {position: 1, prefix: -v}}
  quiet: {type: boolean, inputBinding: {position: 2, prefix: -q}}
  ids: {type: "int[]", inputBinding: {position: 3, prefix: --id}}
  tags: {type: "string[]", inputBinding: {position: 4, prefix: --tags, itemSeparator: ","}}
  none: {type: "string[]", inputBinding: {position: 5, prefix: --none}}
  level: {type: int, inputBinding: {position: 6, prefix: "--level=", separate: false}}
  title: {type: string, inputBinding: {position: 7}}
"#;
    let inputs = r#"
verbose: true
quiet: false
ids: [1, 2]
tags: [a, b]
none: []
level: 3
title: "two words"
"#;

    let cmd = synthesize(tool, inputs, &stager).unwrap();
    assert_eq!(cmd, "render -v --id 1 2 --tags a,b --level=3 'two words'");
}

#[test]
fn test_files_render_as_locations_and_are_unstaged() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    let tool = r#"
class: CommandLineTool
baseCommand: process
inputs:
  - id: input
    type: File
    inputBinding: {position: 1, prefix: --input}
  - id: extra
    type: File[]
    inputBinding: {position: 2}
"#;
    let inputs = r#"
input: {class: File, location: /vo.cta.in2p3.fr/MC/run1.simtel.zst}
extra:
  - {class: File, location: "file:///data/a.h5"}
  - {class: File, path: data/b.h5}
"#;

    let cmd = synthesize(tool, inputs, &stager).unwrap();
    assert_eq!(
        cmd,
        "process --input /vo.cta.in2p3.fr/MC/run1.simtel.zst file:///data/a.h5 data/b.h5"
    );

    // No staging path leaks into the command line.
    assert!(!cmd.contains(&*tmp.path().to_string_lossy()));
    // Nothing is left behind, not even the directories.
    assert!(files_under(tmp.path()).is_empty());
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_locations_sharing_a_placeholder_keep_their_own_text() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    // All of these stage to <root>/data/x.h5.
    let tool = r#"
class: CommandLineTool
baseCommand: proc
inputs:
  a: {type: File, inputBinding: {position: 1, prefix: --a}}
  b: {type: File, inputBinding: {position: 2, prefix: --b}}
  c: {type: File, inputBinding: {position: 3, prefix: "--c=", separate: false}}
  both: {type: "File[]", inputBinding: {position: 4, itemSeparator: ","}}
"#;
    let inputs = r#"
a: {class: File, location: /data/x.h5}
b: {class: File, location: data/x.h5}
c: {class: File, location: "file:///data/x.h5"}
both:
  - {class: File, location: data/x.h5}
  - {class: File, location: /data/x.h5}
"#;

    let cmd = synthesize(tool, inputs, &stager).unwrap();
    assert_eq!(
        cmd,
        "proc --a /data/x.h5 --b data/x.h5 --c=file:///data/x.h5 data/x.h5,/data/x.h5"
    );
    assert!(files_under(tmp.path()).is_empty());
}

#[test]
fn test_existing_files_are_kept() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    fs::write(tmp.path().join("data/real.h5"), b"payload").unwrap();

    let tool = "class: CommandLineTool\nbaseCommand: cat\ninputs:\n  f: {type: File, inputBinding: {}}\n";
    let cmd = synthesize(tool, "f: {class: File, location: /data/real.h5}", &stager).unwrap();

    assert_eq!(cmd, "cat /data/real.h5");
    let content = fs::read(tmp.path().join("data/real.h5")).unwrap();
    assert_eq!(content, b"payload");
}

#[test]
fn test_staging_is_undone_on_error() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    // The File stages fine, then the expression argument aborts binding.
    let tool = r#"
class: CommandLineTool
baseCommand: run
arguments:
  - valueFrom: $(inputs.f.basename)
inputs:
  f: {type: File, inputBinding: {position: 1}}
"#;
    let err = synthesize(tool, "f: {class: File, location: /deep/dir/x.h5}", &stager).unwrap_err();

    assert!(matches!(err, StepError::Cwl(CwlError::Unsupported(_))));
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_stage_unstage_symmetry() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    let before = files_under(tmp.path());
    {
        let staged = stager
            .stage_all(["/a/b/c.txt", "/a/d.txt", "/a/d.txt", "e.txt"])
            .unwrap();
        assert_eq!(staged.len(), 3);
        for path in staged.paths() {
            assert!(path.is_file());
            assert_eq!(fs::metadata(path).unwrap().len(), 0);
        }
        // Dropped here without release.
    }
    assert_eq!(files_under(tmp.path()), before);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_invalid_locations_are_rejected() {
    let stager = FakeFileStager::new("/tmp/never-used");

    for location in ["", "/", "file://", "../escape.txt", "/a/../../b"] {
        let err = stager.staged_path(location).unwrap_err();
        assert!(
            matches!(err, StagingError::InvalidLocation { .. }),
            "{location:?} was accepted"
        );
    }
}

#[test]
fn test_unstaging_a_missing_file_reports_the_location() {
    let tmp = TempDir::new().unwrap();
    let stager = FakeFileStager::new(tmp.path());

    let err = stager.unstage("/not/there.txt").unwrap_err();
    assert!(err.to_string().contains("/not/there.txt"));
}
