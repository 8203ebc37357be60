//! Static site builder.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use url::Url;

use sitebind_dom::{merge_page, DomError, HtmlDocument, ParseMode};

use crate::assets::copy_assets;
use crate::discover::{PageInfo, SitePlan};
use crate::flatten::flatten_root_dirs;

/// Configuration for assembling a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source tree, one subdirectory per section
    pub source_dir: PathBuf,

    /// Output directory; pages land in `<output_dir>/<source dir name>/`
    pub output_dir: PathBuf,

    /// Absolute URL injected as `<base href>` into every page
    pub base_href: String,

    /// File name of the per-directory layout template
    pub template_name: String,

    /// File name of the shared language menu, at the top of the source tree
    pub langmenu_name: String,

    /// Directory name whose contents are moved up one level in the output
    pub root_dir_name: String,

    /// Extensions of files copied verbatim (without the dot)
    pub asset_extensions: Vec<String>,

    /// Directory names that are never descended into
    pub exclude: Vec<String>,

    /// How tolerant HTML parsing is
    pub parse_mode: ParseMode,

    /// Merge pages on the rayon thread pool
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("www"),
            output_dir: PathBuf::from("target"),
            base_href: String::new(),
            template_name: "template.html".to_string(),
            langmenu_name: "langmenu.html".to_string(),
            root_dir_name: "root".to_string(),
            asset_extensions: ["png", "css", "ico", "js", "gif", "jpg", "jpeg", "svg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: vec![".svn".to_string(), ".git".to_string()],
            parse_mode: ParseMode::Lenient,
            parallel: true,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages merged and written
    pub pages: usize,

    /// Number of static files copied
    pub assets: usize,

    /// Number of entries moved out of `root` directories
    pub flattened: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Directory holding the assembled site
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error(
        "Output directory {} overlaps source directory {}",
        output.display(),
        source_dir.display()
    )]
    OverlappingDirectories { source_dir: PathBuf, output: PathBuf },

    #[error("Invalid base href '{href}': {message}")]
    InvalidBaseHref { href: String, message: String },

    #[error("Language menu not found: {}", .0.display())]
    MissingLangmenu(PathBuf),

    #[error("Missing template for {}: expected {}", page.display(), template.display())]
    MissingTemplate { page: PathBuf, template: PathBuf },

    #[error("Template for {} has no <{name}> placeholder", page.display())]
    MissingPlaceholder { page: PathBuf, name: String },

    #[error(
        "Template for {} has {count} <{name}> placeholders, expected exactly one",
        page.display()
    )]
    DuplicatePlaceholder {
        page: PathBuf,
        name: String,
        count: usize,
    },

    #[error("Malformed markup while building {}: {origin}: {message}", page.display())]
    Malformed {
        page: PathBuf,
        origin: String,
        message: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Flattening {} onto {} would overwrite other output", from.display(), to.display())]
    FlattenCollision { from: PathBuf, to: PathBuf },
}

/// Wrap an `io::Error` with the path it happened on.
pub(crate) fn io_err(path: &Path) -> impl FnOnce(io::Error) -> BuildError {
    let path = path.to_path_buf();
    move |source| BuildError::Io { path, source }
}

/// Attach the page being built to a document error.
fn page_err(page: &Path, err: DomError) -> BuildError {
    let page = page.to_path_buf();
    match err {
        DomError::Io { path, source } => BuildError::Io { path, source },
        DomError::Malformed { origin, message } => BuildError::Malformed {
            page,
            origin,
            message,
        },
        DomError::MissingPlaceholder { name } => BuildError::MissingPlaceholder { page, name },
        DomError::DuplicatePlaceholder { name, count } => {
            BuildError::DuplicatePlaceholder { page, name, count }
        }
        DomError::MissingElement { name } => BuildError::Malformed {
            origin: page.display().to_string(),
            page,
            message: format!("document has no <{}> element", name),
        },
        DomError::Serialize(source) => BuildError::Io { path: page, source },
    }
}

/// Site assembler.
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    /// Create a new builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Directory the assembled site is written to.
    pub fn output_root(&self) -> Result<PathBuf, BuildError> {
        Ok(self.config.output_dir.join(self.source_name()?))
    }

    /// Build the site.
    ///
    /// Nothing is written until the whole source tree has been checked:
    /// every page needs a template beside it and no two files may land on
    /// the same flattened output path. After that the first failing page
    /// aborts the run.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let output_root = self.validate()?;
        let plan = SitePlan::discover(&self.config)?;

        let langmenu = self.config.source_dir.join(&self.config.langmenu_name);
        if !plan.pages.is_empty() && !langmenu.is_file() {
            return Err(BuildError::MissingLangmenu(langmenu));
        }

        if output_root.exists() {
            tracing::info!("Removing previous output {}", output_root.display());
            fs::remove_dir_all(&output_root).map_err(io_err(&output_root))?;
        }
        fs::create_dir_all(&output_root).map_err(io_err(&output_root))?;

        for (section, count) in plan.sections() {
            tracing::info!("Building section {} ({} pages)", section, count);
        }

        // Both branches stop at the first failure. Serial runs report the
        // first failing page in sorted order; parallel runs report whichever
        // failure rayon observes first.
        if self.config.parallel {
            plan.pages
                .par_iter()
                .try_for_each(|page| self.build_page(page, &langmenu, &output_root))?;
        } else {
            plan.pages
                .iter()
                .try_for_each(|page| self.build_page(page, &langmenu, &output_root))?;
        }

        let assets = copy_assets(&plan.assets, &output_root)?;
        let flattened = flatten_root_dirs(&output_root, &self.config.root_dir_name)?;

        Ok(BuildResult {
            pages: plan.pages.len(),
            assets,
            flattened,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: output_root,
        })
    }

    /// Check the configuration against the filesystem and return the output root.
    fn validate(&self) -> Result<PathBuf, BuildError> {
        let source = &self.config.source_dir;
        if !source.is_dir() {
            return Err(BuildError::SourceNotFound(source.clone()));
        }

        validate_base_href(&self.config.base_href)?;

        let output_root = self.output_root()?;
        let source_abs = resolve(source)?;
        let output_abs = resolve(&output_root)?;
        if output_abs.starts_with(&source_abs) || source_abs.starts_with(&output_abs) {
            return Err(BuildError::OverlappingDirectories {
                source_dir: source.clone(),
                output: output_root,
            });
        }

        Ok(output_root)
    }

    fn source_name(&self) -> Result<OsString, BuildError> {
        let source = &self.config.source_dir;
        if let Some(name) = source.file_name() {
            return Ok(name.to_os_string());
        }

        // "." and friends have no file name of their own
        let canonical = source.canonicalize().map_err(io_err(source))?;
        canonical
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| BuildError::SourceNotFound(source.clone()))
    }

    /// Merge a single page and write it to its mirrored output path.
    fn build_page(
        &self,
        page: &PageInfo,
        langmenu: &Path,
        output_root: &Path,
    ) -> Result<(), BuildError> {
        let mode = self.config.parse_mode;
        let page_path = &page.source_path;

        // Parsed fresh for every page so no state carries over between pages
        let template = HtmlDocument::parse_file(&page.template_path, mode)
            .map_err(|e| page_err(page_path, e))?;
        let menu = HtmlDocument::parse_file(langmenu, mode).map_err(|e| page_err(page_path, e))?;
        let doc = HtmlDocument::parse_file(page_path, mode).map_err(|e| page_err(page_path, e))?;

        let merged = merge_page(template, &menu, &doc, &self.config.base_href)
            .map_err(|e| page_err(page_path, e))?;
        let html = merged.to_html().map_err(|e| page_err(page_path, e))?;

        let output_path = output_root.join(&page.relative_path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&output_path, html).map_err(io_err(&output_path))?;

        tracing::debug!("Wrote {}", output_path.display());
        Ok(())
    }
}

fn validate_base_href(href: &str) -> Result<(), BuildError> {
    let invalid = |message: String| BuildError::InvalidBaseHref {
        href: href.to_string(),
        message,
    };

    let url = Url::parse(href).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".to_string()));
    }
    Ok(())
}

/// Absolute form of `path` with symlinks resolved on its existing prefix.
///
/// The output directory usually does not exist yet, so the deepest existing
/// ancestor is canonicalized and the rest is appended lexically.
fn resolve(path: &Path) -> Result<PathBuf, BuildError> {
    let absolute = std::path::absolute(path).map_err(io_err(path))?;

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize().map_err(io_err(existing))?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    const TEMPLATE: &str = "<!DOCTYPE html><html><head><title>Logisim</title></head>\
        <body><langmenu></langmenu><div id=\"content\"><contents></contents></div></body></html>";

    const LANGMENU: &str = "<!DOCTYPE html><html><head></head><body>\
        <div class=\"langmenu\"><a href=\"de/\">[de]</a></div></body></html>";

    fn page(title: &str, body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta name=\"page\" content=\"{}\"></head><body>{}</body></html>",
            title, body
        )
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small two-section site: `root` (top level) and `de`, which has its own `root`.
    fn fixture_site(dir: &Path) -> BuildConfig {
        let www = dir.join("www");
        write(&www.join("langmenu.html"), LANGMENU);
        write(&www.join("root/template.html"), TEMPLATE);
        write(&www.join("root/index.html"), &page("index", "<h1>Welcome</h1>"));
        write(&www.join("root/download.html"), &page("download", "<p>Get it</p>"));
        write(&www.join("root/style.css"), "body { color: black; }");
        write(&www.join("de/template.html"), TEMPLATE);
        write(&www.join("de/index.html"), &page("index", "<h1>Willkommen</h1>"));
        write(&www.join("de/root/template.html"), TEMPLATE);
        write(&www.join("de/root/faq.html"), &page("faq", "<h1>Fragen</h1>"));
        write(&www.join("simpletreemenu.js"), "var ddtreemenu = {};");

        BuildConfig {
            source_dir: www,
            output_dir: dir.join("target"),
            base_href: "https://www.example.org/".to_string(),
            ..Default::default()
        }
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn builds_every_page_once() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());

        let result = StaticBuilder::new(config).build().unwrap();

        assert_eq!(result.pages, 4);
        let out = temp.path().join("target/www");
        assert_eq!(result.output_dir, out);
        assert!(out.join("index.html").is_file());
        assert!(out.join("download.html").is_file());
        assert!(out.join("de/index.html").is_file());
        assert!(!out.join("template.html").exists());
        assert!(!out.join("de/template.html").exists());
        assert!(!out.join("langmenu.html").exists());
    }

    #[test]
    fn flattens_root_section() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());

        let result = StaticBuilder::new(config).build().unwrap();

        let out = temp.path().join("target/www");
        assert!(!out.join("root").exists());
        assert!(out.join("style.css").is_file());
        assert_eq!(result.flattened, 4);
    }

    #[test]
    fn flattens_root_inside_section() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());

        StaticBuilder::new(config).build().unwrap();

        let out = temp.path().join("target/www");
        assert!(!out.join("de/root").exists());
        let html = fs::read_to_string(out.join("de/faq.html")).unwrap();
        assert!(html.contains("<div id=\"content\"><h1>Fragen</h1></div>"));
    }

    #[test]
    fn serial_build_stops_at_first_failure() {
        let temp = tempdir().unwrap();
        let www = temp.path().join("www");
        write(&www.join("langmenu.html"), LANGMENU);
        write(
            &www.join("a/template.html"),
            "<html><head></head><body><langmenu></langmenu></body></html>",
        );
        write(&www.join("a/index.html"), &page("a", "<p>a</p>"));
        write(&www.join("b/template.html"), TEMPLATE);
        write(&www.join("b/index.html"), &page("b", "<p>b</p>"));

        let result = StaticBuilder::new(BuildConfig {
            source_dir: www,
            output_dir: temp.path().join("target"),
            base_href: "https://www.example.org/".to_string(),
            parallel: false,
            ..Default::default()
        })
        .build();

        match result {
            Err(BuildError::MissingPlaceholder { page, name }) => {
                assert!(page.ends_with("a/index.html"));
                assert_eq!(name, "contents");
            }
            other => panic!("expected MissingPlaceholder, got {:?}", other),
        }
        assert!(!temp.path().join("target/www/b/index.html").exists());
    }

    #[test]
    fn merged_page_has_menu_content_and_base() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());

        StaticBuilder::new(config).build().unwrap();

        let html = fs::read_to_string(temp.path().join("target/www/de/index.html")).unwrap();
        assert!(html.contains(
            "<meta name=\"page\" content=\"index\"><base href=\"https://www.example.org/\"></head>"
        ));
        assert!(html.contains("<div class=\"langmenu\"><a href=\"de/\">[de]</a></div>"));
        assert!(html.contains("<div id=\"content\"><h1>Willkommen</h1></div>"));
        assert!(!html.contains("<langmenu"));
        assert!(!html.contains("<contents"));
    }

    #[test]
    fn copies_assets_verbatim() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());

        let result = StaticBuilder::new(config).build().unwrap();

        assert_eq!(result.assets, 2);
        let out = temp.path().join("target/www");
        assert_eq!(
            fs::read_to_string(out.join("simpletreemenu.js")).unwrap(),
            "var ddtreemenu = {};"
        );
        assert_eq!(
            fs::read_to_string(out.join("style.css")).unwrap(),
            "body { color: black; }"
        );
    }

    #[test]
    fn repeated_builds_are_identical() {
        let temp = tempdir().unwrap();
        let mut config = fixture_site(temp.path());

        config.output_dir = temp.path().join("first");
        StaticBuilder::new(config.clone()).build().unwrap();
        config.output_dir = temp.path().join("second");
        StaticBuilder::new(config).build().unwrap();

        let first = snapshot(&temp.path().join("first/www"));
        let second = snapshot(&temp.path().join("second/www"));
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn serial_and_parallel_builds_match() {
        let temp = tempdir().unwrap();
        let mut config = fixture_site(temp.path());

        config.output_dir = temp.path().join("parallel");
        StaticBuilder::new(config.clone()).build().unwrap();
        config.output_dir = temp.path().join("serial");
        config.parallel = false;
        StaticBuilder::new(config).build().unwrap();

        assert_eq!(
            snapshot(&temp.path().join("parallel/www")),
            snapshot(&temp.path().join("serial/www"))
        );
    }

    #[test]
    fn rebuild_into_same_output_succeeds() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());
        let builder = StaticBuilder::new(config);

        builder.build().unwrap();
        let result = builder.build().unwrap();

        assert_eq!(result.pages, 4);
        assert!(temp.path().join("target/www/index.html").is_file());
    }

    #[test]
    fn missing_template_writes_nothing() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());
        write(
            &config.source_dir.join("es/index.html"),
            &page("index", "<h1>Bienvenido</h1>"),
        );

        let result = StaticBuilder::new(config).build();

        match result {
            Err(BuildError::MissingTemplate { page, template }) => {
                assert!(page.ends_with("es/index.html"));
                assert!(template.ends_with("es/template.html"));
            }
            other => panic!("expected MissingTemplate, got {:?}", other),
        }
        assert!(!temp.path().join("target/www/es/index.html").exists());
        assert!(!temp.path().join("target/www/index.html").exists());
    }

    #[test]
    fn missing_placeholder_names_the_page() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());
        write(
            &config.source_dir.join("de/template.html"),
            "<html><head></head><body><langmenu></langmenu></body></html>",
        );

        let result = StaticBuilder::new(config).build();

        match result {
            Err(BuildError::MissingPlaceholder { page, name }) => {
                assert!(page.ends_with("de/index.html"));
                assert_eq!(name, "contents");
            }
            other => panic!("expected MissingPlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn strict_mode_rejects_broken_page() {
        let temp = tempdir().unwrap();
        let mut config = fixture_site(temp.path());
        config.parse_mode = ParseMode::Strict;
        write(&config.source_dir.join("de/broken.html"), "<p>unclosed</div>");

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Malformed { .. })));
    }

    #[test]
    fn missing_langmenu_is_reported() {
        let temp = tempdir().unwrap();
        let config = fixture_site(temp.path());
        fs::remove_file(config.source_dir.join("langmenu.html")).unwrap();

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::MissingLangmenu(_))));
    }

    #[test]
    fn rejects_relative_base_href() {
        let temp = tempdir().unwrap();
        let mut config = fixture_site(temp.path());
        config.base_href = "/docs/".to_string();

        let result = StaticBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::InvalidBaseHref { .. })));
    }

    #[test]
    fn rejects_output_inside_source() {
        let temp = tempdir().unwrap();
        let mut config = fixture_site(temp.path());
        config.output_dir = config.source_dir.join("out");

        let result = StaticBuilder::new(config).build();

        assert!(matches!(
            result,
            Err(BuildError::OverlappingDirectories { .. })
        ));
    }

    #[test]
    fn rejects_missing_source() {
        let temp = tempdir().unwrap();

        let result = StaticBuilder::new(BuildConfig {
            source_dir: temp.path().join("nope"),
            output_dir: temp.path().join("target"),
            base_href: "https://example.org/".to_string(),
            ..Default::default()
        })
        .build();

        assert!(matches!(result, Err(BuildError::SourceNotFound(_))));
    }
}
