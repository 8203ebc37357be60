//! Static asset copying.
//!
//! Stylesheets, images and scripts (the tree-menu widget among them) are not
//! merged, only copied to their mirrored output path.

use std::fs;
use std::path::Path;

use crate::builder::{io_err, BuildError};
use crate::discover::AssetInfo;

/// Copy every asset byte-for-byte under `output_root`.
///
/// Returns the number of files copied.
pub fn copy_assets(assets: &[AssetInfo], output_root: &Path) -> Result<usize, BuildError> {
    for asset in assets {
        let destination = output_root.join(&asset.relative_path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::copy(&asset.source_path, &destination).map_err(io_err(&asset.source_path))?;
        tracing::debug!("Copied {}", asset.relative_path.display());
    }

    if !assets.is_empty() {
        tracing::info!("Copied {} static files", assets.len());
    }
    Ok(assets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn copies_into_mirrored_paths() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("www/en/tree/closed.gif");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, [0x47, 0x49, 0x46, 0x38]).unwrap();
        let out = temp.path().join("target/www");

        let copied = copy_assets(
            &[AssetInfo {
                source_path: source,
                relative_path: PathBuf::from("en/tree/closed.gif"),
            }],
            &out,
        )
        .unwrap();

        assert_eq!(copied, 1);
        assert_eq!(
            fs::read(out.join("en/tree/closed.gif")).unwrap(),
            vec![0x47, 0x49, 0x46, 0x38]
        );
    }

    #[test]
    fn reports_missing_source() {
        let temp = tempdir().unwrap();

        let result = copy_assets(
            &[AssetInfo {
                source_path: temp.path().join("gone.css"),
                relative_path: PathBuf::from("gone.css"),
            }],
            temp.path(),
        );

        assert!(matches!(result, Err(BuildError::Io { .. })));
    }
}
