//! Source tree discovery.
//!
//! Walks the source tree once and classifies every file as a page, a static
//! asset, or something to ignore. The resulting [`SitePlan`] is fully checked
//! before the builder writes anything.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::builder::{BuildConfig, BuildError};
use crate::flatten::flattened_path;

/// A page to be merged.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Source file path
    pub source_path: PathBuf,

    /// Relative path from the source dir
    pub relative_path: PathBuf,

    /// The `template.html` beside the page
    pub template_path: PathBuf,
}

/// A file copied verbatim.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    /// Source file path
    pub source_path: PathBuf,

    /// Relative path from the source dir
    pub relative_path: PathBuf,
}

/// Everything a build will produce, in deterministic order.
#[derive(Debug, Default)]
pub struct SitePlan {
    pub pages: Vec<PageInfo>,
    pub assets: Vec<AssetInfo>,
}

impl SitePlan {
    /// Walk the source tree and check the result.
    ///
    /// Pages are `*.html` files inside a section directory (never at the top
    /// of the source tree), other than templates and the language menu.
    pub fn discover(config: &BuildConfig) -> Result<Self, BuildError> {
        let source = &config.source_dir;
        let mut plan = SitePlan::default();

        let walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e, &config.exclude));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative_path = path.strip_prefix(source).unwrap_or(path).to_path_buf();
            let file_name = entry.file_name().to_string_lossy();

            if has_extension(path, "html") {
                if entry.depth() < 2
                    || file_name == config.template_name.as_str()
                    || file_name == config.langmenu_name.as_str()
                {
                    continue;
                }

                plan.pages.push(PageInfo {
                    source_path: path.to_path_buf(),
                    template_path: path.with_file_name(&config.template_name),
                    relative_path,
                });
            } else if config
                .asset_extensions
                .iter()
                .any(|ext| has_extension(path, ext))
            {
                plan.assets.push(AssetInfo {
                    source_path: path.to_path_buf(),
                    relative_path,
                });
            } else {
                tracing::debug!("Skipping {}", relative_path.display());
            }
        }

        plan.pages.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        plan.assets.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        plan.check_templates()?;
        plan.check_collisions(&config.root_dir_name)?;

        tracing::debug!(
            "Discovered {} pages and {} assets under {}",
            plan.pages.len(),
            plan.assets.len(),
            source.display()
        );

        Ok(plan)
    }

    /// Every page needs a template beside it.
    fn check_templates(&self) -> Result<(), BuildError> {
        for page in &self.pages {
            if !page.template_path.is_file() {
                return Err(BuildError::MissingTemplate {
                    page: page.source_path.clone(),
                    template: page.template_path.clone(),
                });
            }
        }
        Ok(())
    }

    /// No two sources may end up at the same path once `root` dirs are flattened.
    fn check_collisions(&self, root_dir: &str) -> Result<(), BuildError> {
        let mut seen: HashMap<PathBuf, &Path> = HashMap::new();

        let sources = self
            .pages
            .iter()
            .map(|p| p.relative_path.as_path())
            .chain(self.assets.iter().map(|a| a.relative_path.as_path()));

        for relative in sources {
            let destination = flattened_path(relative, root_dir);
            if seen.insert(destination.clone(), relative).is_some() {
                return Err(BuildError::FlattenCollision {
                    from: relative.to_path_buf(),
                    to: destination,
                });
            }
        }
        Ok(())
    }

    /// Page counts per top-level section.
    pub fn sections(&self) -> BTreeMap<String, usize> {
        let mut sections = BTreeMap::new();
        for page in &self.pages {
            let section = page
                .relative_path
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .unwrap_or_default();
            *sections.entry(section).or_insert(0) += 1;
        }
        sections
    }
}

/// Hidden entries and excluded directory names are never visited.
fn is_skipped(entry: &DirEntry, exclude: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }

    entry.file_type().is_dir() && exclude.iter().any(|e| e.as_str() == &*name)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
