use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::config::ForceDefaults;

pub const STATS_OPTIONS: &[&str] = &[
    "all",
    "ClassBalance",
    "ClassCooccurrence",
    "ClassesPerImage",
    "ObjectsDistribution",
    "ObjectSizes",
    "ClassSizes",
    "ClassesHeatmaps",
    "ClassesPreview",
    "Previews",
    "ClassesTreemap",
];

pub const VISUALS_OPTIONS: &[&str] = &[
    "all",
    "Poster",
    "SideAnnotationsGrid",
    "HorizontalGrid",
    "VerticalGrid",
];

pub const TEXTS_OPTIONS: &[&str] = &["all", "citation", "license", "readme", "download", "summary"];

/// Rendered by the stats generator but commonly picked from the visuals list.
const CLASSES_PREVIEW: &str = "ClassesPreview";

/// Per-run selections telling each repository's script what to regenerate.
///
/// Serialized as the single `--forces` argument, so the field names are part
/// of the script contract.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Forces {
    pub force_stats: Vec<String>,
    pub force_visuals: Vec<String>,
    pub force_texts: Vec<String>,
    pub force_download_sly_url: bool,
    pub force_demo: bool,
}

/// Raw selections for one run, before validation.
///
/// Toggles are `None` when the command line leaves them to the config.
#[derive(Debug, Default, Clone)]
pub struct ForceSelection {
    pub stats: Vec<String>,
    pub visuals: Vec<String>,
    pub texts: Vec<String>,
    pub download_sly_url: Option<bool>,
    pub demo: Option<bool>,
}

impl ForceSelection {
    /// Overlay CLI selections on config defaults.
    ///
    /// A non-empty category on the command line replaces the configured one.
    /// An explicit toggle on the command line wins over the configured value.
    pub fn over(self, defaults: &ForceDefaults) -> Self {
        fn pick(cli: Vec<String>, cfg: &[String]) -> Vec<String> {
            if cli.is_empty() { cfg.to_vec() } else { cli }
        }
        Self {
            stats: pick(self.stats, &defaults.stats),
            visuals: pick(self.visuals, &defaults.visuals),
            texts: pick(self.texts, &defaults.texts),
            download_sly_url: Some(self.download_sly_url.unwrap_or(defaults.download_sly_url)),
            demo: Some(self.demo.unwrap_or(defaults.demo)),
        }
    }
}

impl Forces {
    /// Validate and normalize a selection.
    ///
    /// - `ClassesPreview` chosen under visuals is moved to stats.
    /// - Duplicates are dropped, keeping first-selection order.
    ///
    /// # Errors
    /// Returns an error naming the category if an option is not recognized.
    pub fn build(sel: ForceSelection) -> Result<Self> {
        let mut stats = sel.stats;
        let mut visuals = Vec::with_capacity(sel.visuals.len());
        for v in sel.visuals {
            if v == CLASSES_PREVIEW {
                stats.push(v);
            } else {
                visuals.push(v);
            }
        }

        Ok(Self {
            force_stats: checked("stats", stats, STATS_OPTIONS)?,
            force_visuals: checked("visuals", visuals, VISUALS_OPTIONS)?,
            force_texts: checked("texts", sel.texts, TEXTS_OPTIONS)?,
            force_download_sly_url: sel.download_sly_url.unwrap_or_default(),
            force_demo: sel.demo.unwrap_or_default(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize forces")
    }
}

fn checked(category: &str, picked: Vec<String>, allowed: &[&str]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(picked.len());
    for p in picked {
        if !allowed.contains(&p.as_str()) {
            bail!(
                "unknown {} option: {} (expected one of: {})",
                category,
                p,
                allowed.join(", ")
            );
        }
        if !out.contains(&p) {
            out.push(p);
        }
    }
    Ok(out)
}

/// CLI command: print the recognized force options per category.
pub fn cmd_options() -> Result<()> {
    for (category, options) in [
        ("stats", STATS_OPTIONS),
        ("visuals", VISUALS_OPTIONS),
        ("texts", TEXTS_OPTIONS),
    ] {
        println!("{}:", category);
        for o in options {
            println!("- {}", o);
        }
    }
    println!("toggles:\n- download-sly-url\n- demo");
    Ok(())
}
