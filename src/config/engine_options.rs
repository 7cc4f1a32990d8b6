//! Immutable engine option snapshots
//!
//! Analyzer options come from several layers: global defaults, engine
//! settings, the selected profile, and per-directory overrides. The builder
//! merges them in that order and hands out one frozen [`EngineOptions`] per
//! engine per run. Nothing downstream mutates a snapshot.
//!
//! Merge rules: scalars and lists from a later layer replace earlier ones;
//! `overrides` and `category_mapping` merge key by key, later wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One layer of option values. Unset fields leave earlier layers alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct OptionsLayer {
    pub profile: Option<String>,
    pub config_file: Option<String>,
    pub plugin_args: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub overrides: BTreeMap<String, Value>,
    pub category_mapping: BTreeMap<String, String>,
}

/// Frozen option snapshot for one engine in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    profile: Option<String>,
    config_file: Option<String>,
    plugin_args: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
    overrides: BTreeMap<String, Value>,
    category_mapping: BTreeMap<String, String>,
}

impl EngineOptions {
    pub fn builder() -> EngineOptionsBuilder {
        EngineOptionsBuilder::default()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn config_file(&self) -> Option<&str> {
        self.config_file.as_deref()
    }

    pub fn plugin_args(&self) -> &[String] {
        &self.plugin_args
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn overrides(&self) -> &BTreeMap<String, Value> {
        &self.overrides
    }

    pub fn category_mapping(&self) -> &BTreeMap<String, String> {
        &self.category_mapping
    }

    /// JSON form, as embedded in manifests and hashed into engine signatures.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn apply(&mut self, layer: &OptionsLayer) {
        if let Some(profile) = &layer.profile {
            self.profile = Some(profile.clone());
        }
        if let Some(config_file) = &layer.config_file {
            self.config_file = Some(config_file.clone());
        }
        if let Some(args) = &layer.plugin_args {
            self.plugin_args = args.clone();
        }
        if let Some(include) = &layer.include {
            self.include = include.clone();
        }
        if let Some(exclude) = &layer.exclude {
            self.exclude = exclude.clone();
        }
        for (k, v) in &layer.overrides {
            self.overrides.insert(k.clone(), v.clone());
        }
        for (k, v) in &layer.category_mapping {
            self.category_mapping.insert(k.clone(), v.clone());
        }
    }
}

/// Collects option layers and produces snapshots.
#[derive(Debug, Clone, Default)]
pub struct EngineOptionsBuilder {
    defaults: OptionsLayer,
    engine: OptionsLayer,
    profile: OptionsLayer,
    directories: Vec<(PathBuf, OptionsLayer)>,
}

impl EngineOptionsBuilder {
    pub fn defaults(mut self, layer: OptionsLayer) -> Self {
        self.defaults = layer;
        self
    }

    pub fn engine(mut self, layer: OptionsLayer) -> Self {
        self.engine = layer;
        self
    }

    pub fn profile(mut self, layer: OptionsLayer) -> Self {
        self.profile = layer;
        self
    }

    /// Override applied only when building for paths under `dir`.
    pub fn directory(mut self, dir: impl Into<PathBuf>, layer: OptionsLayer) -> Self {
        self.directories.push((dir.into(), layer));
        self
    }

    /// Snapshot without any per-directory overrides.
    pub fn build(&self) -> EngineOptions {
        let mut options = EngineOptions::default();
        options.apply(&self.defaults);
        options.apply(&self.engine);
        options.apply(&self.profile);
        options
    }

    /// Snapshot for `path`: directory overrides whose directory contains
    /// `path` are applied shallowest first, so the nearest one wins.
    pub fn build_for(&self, path: &Path) -> EngineOptions {
        let mut options = self.build();
        let mut matching: Vec<&(PathBuf, OptionsLayer)> = self
            .directories
            .iter()
            .filter(|(dir, _)| path.starts_with(dir))
            .collect();
        matching.sort_by_key(|(dir, _)| dir.components().count());
        for (_, layer) in matching {
            options.apply(layer);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer_with_profile(profile: &str) -> OptionsLayer {
        OptionsLayer {
            profile: Some(profile.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_later_layers_win() {
        let options = EngineOptions::builder()
            .defaults(OptionsLayer {
                profile: Some("default".to_string()),
                plugin_args: Some(vec!["--a".to_string()]),
                ..Default::default()
            })
            .engine(layer_with_profile("strict"))
            .build();

        assert_eq!(options.profile(), Some("strict"));
        assert_eq!(options.plugin_args(), &["--a".to_string()]);
    }

    #[test]
    fn test_overrides_merge_key_by_key() {
        let mut defaults = OptionsLayer::default();
        defaults.overrides.insert("a".to_string(), json!(1));
        defaults.overrides.insert("b".to_string(), json!(2));
        let mut profile = OptionsLayer::default();
        profile.overrides.insert("b".to_string(), json!(3));

        let options = EngineOptions::builder()
            .defaults(defaults)
            .profile(profile)
            .build();

        assert_eq!(options.overrides().get("a"), Some(&json!(1)));
        assert_eq!(options.overrides().get("b"), Some(&json!(3)));
    }

    #[test]
    fn test_directory_overrides_nearest_wins() {
        let builder = EngineOptions::builder()
            .engine(layer_with_profile("engine"))
            .directory("src/legacy", layer_with_profile("legacy-deep"))
            .directory("src", layer_with_profile("src"));

        assert_eq!(builder.build().profile(), Some("engine"));
        assert_eq!(
            builder.build_for(Path::new("src/app/main.py")).profile(),
            Some("src")
        );
        assert_eq!(
            builder.build_for(Path::new("src/legacy/old.py")).profile(),
            Some("legacy-deep")
        );
        assert_eq!(
            builder.build_for(Path::new("tests/test_x.py")).profile(),
            Some("engine")
        );
    }

    #[test]
    fn test_to_value_uses_camel_case() {
        let options = EngineOptions::builder()
            .engine(OptionsLayer {
                plugin_args: Some(vec!["--strict".to_string()]),
                config_file: Some("pyproject.toml".to_string()),
                ..Default::default()
            })
            .build();
        let value = options.to_value();
        assert_eq!(value["pluginArgs"], json!(["--strict"]));
        assert_eq!(value["configFile"], json!("pyproject.toml"));
    }

    #[test]
    fn test_layer_from_toml() {
        let layer: OptionsLayer = toml::from_str(
            r#"
profile = "ci"
plugin_args = ["--x"]
[overrides]
level = "basic"
"#,
        )
        .unwrap();
        assert_eq!(layer.profile.as_deref(), Some("ci"));
        assert_eq!(layer.overrides.get("level"), Some(&json!("basic")));
    }
}
