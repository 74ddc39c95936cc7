//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is resolved once by the host (option store, CLI,
//! TOML file) and passed by value into each run. The core never reads the
//! environment, global state, or the option store itself - anything the
//! host knows arrives here, including the opaque [`HostCapabilities`]
//! resolved by the hosting-environment detector.

mod error;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::transform::TransformId;

pub use error::ConfigError;

// =============================================================================
// PipelineConfig
// =============================================================================

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Enabled transforms. Order matters within a priority level.
    pub transforms: Vec<TransformId>,

    pub critical_css: CriticalCssOptions,
    pub asset_defer: AssetDeferOptions,

    /// Pipeline-entry guard deciding whether a DOM is built at all.
    pub guard: DomGuard,

    /// Capabilities of the hosting environment, resolved by the host.
    pub capabilities: HostCapabilities,
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = rustc_hash::FxHashSet::default();
        for id in &self.transforms {
            if !seen.insert(*id) {
                return Err(ConfigError::Validation(format!(
                    "transform `{id}` listed more than once"
                )));
            }
        }
        if self.transforms.contains(&TransformId::CriticalCss)
            && self.critical_css.css.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "critical-css is enabled but `critical_css.css` is empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Per-transform options
// =============================================================================

/// Options for the critical CSS transform.
///
/// The CSS text is resolved by the host *before* the run (file cache,
/// generation service) - no transform performs I/O mid-pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CriticalCssOptions {
    /// Pre-resolved critical CSS for the page being processed.
    pub css: String,
}

/// Options for the asset deferral transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetDeferOptions {
    /// Also add `defer` to ordinary external scripts.
    pub defer_scripts: bool,
    /// Substrings of `href`/`src` values to leave untouched.
    pub exclude: Vec<String>,
}

impl AssetDeferOptions {
    /// True when a URL matches the exclusion list.
    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude.iter().any(|pat| url.contains(pat.as_str()))
    }
}

// =============================================================================
// DomGuard
// =============================================================================

/// Pipeline-entry guard: decides whether the DOM is built for this input.
///
/// The closed replacement for an overridable "okay to create DOM"
/// predicate - the caller picks a variant, nothing is decided inside the
/// pipeline at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomGuard {
    /// Always build the DOM (the default).
    #[default]
    AlwaysBuild,
    /// Skip inputs whose first non-whitespace byte is not `<` - cheap
    /// protection when the cache directory mixes HTML with other payloads.
    SkipNonHtml,
}

impl DomGuard {
    pub fn allows(&self, input: &[u8]) -> bool {
        match self {
            DomGuard::AlwaysBuild => true,
            DomGuard::SkipNonHtml => {
                let input = input.strip_prefix(b"\xef\xbb\xbf").unwrap_or(input);
                input
                    .iter()
                    .find(|b| !b.is_ascii_whitespace())
                    .is_some_and(|&b| b == b'<')
            }
        }
    }
}

// =============================================================================
// HostCapabilities
// =============================================================================

/// Opaque capability flags supplied by the hosting-environment detector.
///
/// The core never inspects the environment; a transform that needs a
/// platform-dependent ability checks the flag it was handed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostCapabilities {
    /// Whether the platform permits writing to a local filesystem cache.
    pub local_cache_writes: bool,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: PipelineConfig = toml::from_str(
            r#"
            transforms = ["critical-css", "asset-defer", "noscript-fallback"]
            guard = "skip-non-html"

            [critical_css]
            css = "body{margin:0}"

            [asset_defer]
            defer_scripts = true
            exclude = ["admin.css"]

            [capabilities]
            local_cache_writes = true
            "#,
        )
        .expect("should parse");
        assert_eq!(config.transforms.len(), 3);
        assert_eq!(config.guard, DomGuard::SkipNonHtml);
        assert!(config.asset_defer.defer_scripts);
        assert!(config.capabilities.local_cache_writes);
        config.validate().expect("should validate");
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: PipelineConfig = toml::from_str("").expect("should parse");
        assert!(config.transforms.is_empty());
        assert_eq!(config.guard, DomGuard::AlwaysBuild);
        config.validate().expect("should validate");
    }

    #[test]
    fn test_duplicate_transform_rejected() {
        let config: PipelineConfig =
            toml::from_str(r#"transforms = ["asset-defer", "asset-defer"]"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_critical_css_without_css_rejected() {
        let config: PipelineConfig =
            toml::from_str(r#"transforms = ["critical-css"]"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("minify = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_guard_sniffing() {
        assert!(DomGuard::AlwaysBuild.allows(b"not html"));
        assert!(DomGuard::SkipNonHtml.allows(b"  \n<!doctype html>"));
        assert!(DomGuard::SkipNonHtml.allows("\u{feff}<html>".as_bytes()));
        assert!(!DomGuard::SkipNonHtml.allows(b"{\"json\": true}"));
        assert!(!DomGuard::SkipNonHtml.allows(b""));
    }

    #[test]
    fn test_exclusion_list() {
        let options = AssetDeferOptions {
            defer_scripts: false,
            exclude: vec!["/wp-admin/".to_string(), "critical".to_string()],
        };
        assert!(options.is_excluded("/wp-admin/css/forms.css"));
        assert!(options.is_excluded("critical.css"));
        assert!(!options.is_excluded("/assets/site.css"));
    }
}
