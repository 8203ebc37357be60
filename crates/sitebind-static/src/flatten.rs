//! Root-flattening.
//!
//! Content authored under a `root` directory is published one level up, so
//! the section it belongs to appears unprefixed in the output tree:
//!
//! ```text
//! www/root/index.html   ->  target/www/index.html
//! www/de/index.html     ->  target/www/de/index.html
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::builder::{io_err, BuildError};

/// Where `relative` ends up once every `root_dir` directory component is removed.
///
/// Only directory components are dropped; a file that happens to be named
/// like the root directory keeps its name.
pub fn flattened_path(relative: &Path, root_dir: &str) -> PathBuf {
    let components: Vec<_> = relative.components().collect();
    let last = components.len().saturating_sub(1);

    components
        .iter()
        .enumerate()
        .filter(|(i, c)| *i == last || c.as_os_str() != root_dir)
        .map(|(_, c)| c.as_os_str())
        .collect()
}

/// Move the entries of every `root_dir` directory under `output_root` into
/// its parent, then remove the emptied directory.
///
/// Nested root directories are handled deepest first. Directories that exist
/// on both sides are merged; a file that would replace an existing entry is a
/// [`BuildError::FlattenCollision`].
///
/// Returns the number of entries moved out of root directories.
pub fn flatten_root_dirs(output_root: &Path, root_dir: &str) -> Result<usize, BuildError> {
    let mut root_dirs = Vec::new();
    for entry in WalkDir::new(output_root).min_depth(1).contents_first(true) {
        let entry = entry?;
        if entry.file_type().is_dir() && entry.file_name() == root_dir {
            root_dirs.push(entry.into_path());
        }
    }

    let mut moved = 0;
    for dir in root_dirs {
        moved += flatten_dir(&dir)?;
    }
    Ok(moved)
}

fn flatten_dir(dir: &Path) -> Result<usize, BuildError> {
    let Some(parent) = dir.parent() else {
        return Ok(0);
    };

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err(dir))?;
    entries.sort();

    for from in &entries {
        let Some(name) = from.file_name() else {
            continue;
        };
        move_entry(from, &parent.join(name))?;
    }

    fs::remove_dir(dir).map_err(io_err(dir))?;
    tracing::debug!("Flattened {} ({} entries)", dir.display(), entries.len());

    Ok(entries.len())
}

fn move_entry(from: &Path, to: &Path) -> Result<(), BuildError> {
    if !to.exists() {
        return fs::rename(from, to).map_err(io_err(from));
    }

    if from.is_dir() && to.is_dir() {
        for entry in fs::read_dir(from).map_err(io_err(from))? {
            let entry = entry.map_err(io_err(from))?;
            move_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
        return fs::remove_dir(from).map_err(io_err(from));
    }

    Err(BuildError::FlattenCollision {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn flattened_path_drops_root_components() {
        assert_eq!(
            flattened_path(Path::new("root/index.html"), "root"),
            PathBuf::from("index.html")
        );
        assert_eq!(
            flattened_path(Path::new("en/root/guide/a.html"), "root"),
            PathBuf::from("en/guide/a.html")
        );
        assert_eq!(
            flattened_path(Path::new("de/index.html"), "root"),
            PathBuf::from("de/index.html")
        );
    }

    #[test]
    fn flattened_path_keeps_file_named_root() {
        assert_eq!(
            flattened_path(Path::new("en/root"), "root"),
            PathBuf::from("en/root")
        );
    }

    #[test]
    fn moves_entries_up_and_removes_root() {
        let temp = tempdir().unwrap();
        let out = temp.path();
        write(&out.join("root/index.html"), "index");
        write(&out.join("root/img/logo.png"), "png");
        write(&out.join("de/index.html"), "de");

        let moved = flatten_root_dirs(out, "root").unwrap();

        assert_eq!(moved, 2);
        assert!(!out.join("root").exists());
        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "index");
        assert_eq!(fs::read_to_string(out.join("img/logo.png")).unwrap(), "png");
        assert_eq!(fs::read_to_string(out.join("de/index.html")).unwrap(), "de");
    }

    #[test]
    fn flattens_nested_section_root() {
        let temp = tempdir().unwrap();
        let out = temp.path();
        write(&out.join("docs/root/start.html"), "start");

        flatten_root_dirs(out, "root").unwrap();

        assert!(out.join("docs/start.html").is_file());
        assert!(!out.join("docs/root").exists());
    }

    #[test]
    fn merges_directories_present_on_both_sides() {
        let temp = tempdir().unwrap();
        let out = temp.path();
        write(&out.join("img/a.png"), "a");
        write(&out.join("root/img/b.png"), "b");

        flatten_root_dirs(out, "root").unwrap();

        assert!(out.join("img/a.png").is_file());
        assert!(out.join("img/b.png").is_file());
        assert!(!out.join("root").exists());
    }

    #[test]
    fn refuses_to_overwrite() {
        let temp = tempdir().unwrap();
        let out = temp.path();
        write(&out.join("index.html"), "existing");
        write(&out.join("root/index.html"), "new");

        let result = flatten_root_dirs(out, "root");

        assert!(matches!(result, Err(BuildError::FlattenCollision { .. })));
        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            "existing"
        );
    }
}
