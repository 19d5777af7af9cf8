//! Skeleton script generation
//!
//! A convenience for bench operators starting a new sequence: writes a
//! minimal script with a globals section, one routine, and one test.

use crate::config::constants::script::SCRIPT_EXTENSION;
use crate::pipeline::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE: &str = r#"# PER test sequence skeleton

global COUNT = 0;
global DEVICE_ID = 0x10;

routine "setup" {
    println "configuring bench";
    delay(100);
}

test "smoke" {
    call "setup";
    COUNT = COUNT + 1;
    expect EQ 1;
}
"#;

/// Write a skeleton script at `dest` and return the path actually written.
///
/// A directory destination gets `example.pers` inside it; a filename without
/// the script extension has it appended.
pub fn create_template_script(dest: &Path) -> Result<PathBuf, PipelineError> {
    let path = resolve_destination(dest);
    fs::write(&path, TEMPLATE)?;
    log_info!("template script written", "path" => path.display());
    Ok(path)
}

fn resolve_destination(dest: &Path) -> PathBuf {
    if dest.is_dir() {
        return dest.join(format!("example.{}", SCRIPT_EXTENSION));
    }
    match dest.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == SCRIPT_EXTENSION => dest.to_path_buf(),
        _ => {
            // append, never replace: `plan.v2` becomes `plan.v2.pers`
            let mut raw = dest.as_os_str().to_os_string();
            raw.push(".");
            raw.push(SCRIPT_EXTENSION);
            PathBuf::from(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let written = create_template_script(dir.path()).unwrap();
        assert_eq!(written, dir.path().join("example.pers"));
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.contains("test \"smoke\""));
    }

    #[test]
    fn test_appends_missing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let written = create_template_script(&dir.path().join("bench")).unwrap();
        assert_eq!(written, dir.path().join("bench.pers"));
    }

    #[test]
    fn test_keeps_existing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let written = create_template_script(&dir.path().join("bench.pers")).unwrap();
        assert_eq!(written, dir.path().join("bench.pers"));
    }

    #[test]
    fn test_dotted_name_gets_extension_appended() {
        let dir = tempfile::tempdir().unwrap();
        let written = create_template_script(&dir.path().join("plan.v2")).unwrap();
        assert_eq!(written, dir.path().join("plan.v2.pers"));
    }
}
