//! Site build entry point and config file handling.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sitebind_dom::ParseMode;
use sitebind_static::{BuildConfig, StaticBuilder};

/// Configuration file structure (sitebind.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    site: SiteSettings,
    #[serde(default)]
    build: BuildSettings,
    #[serde(default)]
    assets: AssetSettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SiteSettings {
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    base_href: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BuildSettings {
    template: Option<String>,
    langmenu: Option<String>,
    root_dir: Option<String>,
    strict: Option<bool>,
    parallel: Option<bool>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AssetSettings {
    extensions: Option<Vec<String>>,
}

/// Values given on the command line; these win over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_path: PathBuf,
    pub base_href: Option<String>,
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub strict: bool,
    pub serial: bool,
}

/// Load configuration from the config file if it exists.
/// Returns an error if the file exists but is malformed.
fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Combine command line, config file and built-in defaults.
fn resolve(file: ConfigFile, overrides: Overrides) -> Result<BuildConfig> {
    let defaults = BuildConfig::default();

    let Some(base_href) = overrides.base_href.or(file.site.base_href) else {
        bail!(
            "No base href given: pass BASE_HREF or set site.base_href in {}",
            overrides.config_path.display()
        );
    };

    let strict = overrides.strict || file.build.strict.unwrap_or(false);
    let parallel = !overrides.serial && file.build.parallel.unwrap_or(defaults.parallel);

    Ok(BuildConfig {
        source_dir: overrides
            .source
            .or(file.site.source)
            .unwrap_or(defaults.source_dir),
        output_dir: overrides
            .output
            .or(file.site.output)
            .unwrap_or(defaults.output_dir),
        base_href,
        template_name: file.build.template.unwrap_or(defaults.template_name),
        langmenu_name: file.build.langmenu.unwrap_or(defaults.langmenu_name),
        root_dir_name: file.build.root_dir.unwrap_or(defaults.root_dir_name),
        asset_extensions: file
            .assets
            .extensions
            .unwrap_or(defaults.asset_extensions),
        exclude: file.build.exclude.unwrap_or(defaults.exclude),
        parse_mode: if strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        },
        parallel,
    })
}

/// Run the build.
pub fn run(overrides: Overrides) -> Result<()> {
    let file_config = load_config(&overrides.config_path)?;
    let config = resolve(file_config, overrides)?;

    tracing::info!(
        "Building {} with base {}",
        config.source_dir.display(),
        config.base_href
    );

    let result = StaticBuilder::new(config).build()?;

    tracing::info!(
        "Built {} pages and copied {} files in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
