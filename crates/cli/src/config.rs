use anyhow::{Context, Result};
use domgen_graph::Unresolved;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT_DIR: &str = "inputfiles";
pub const DEFAULT_OUTPUT_DIR: &str = "generated";

/// File names inside the input directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFiles {
    /// Preprocessed browser graph every fragment is merged into
    pub baseline: String,
    pub sources: String,
    pub removed_types: String,
    pub added_types: String,
    pub overriding_types: String,
    pub comments: String,
    pub known_types: String,
    /// Directory of converted fragments, relative to the input directory
    pub idl_dir: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            baseline: "browser.webidl.preprocessed.json".to_string(),
            sources: "idlSources.json".to_string(),
            removed_types: "removedTypes.json".to_string(),
            added_types: "addedTypes.json".to_string(),
            overriding_types: "overridingTypes.json".to_string(),
            comments: "comments.json".to_string(),
            known_types: "knownTypes.json".to_string(),
            idl_dir: "idl".to_string(),
        }
    }
}

/// File names inside the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub web: String,
    pub worker: String,
    pub iterators: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            web: "dom.generated.d.ts".to_string(),
            worker: "webworker.generated.d.ts".to_string(),
            iterators: "dom.iterable.generated.d.ts".to_string(),
        }
    }
}

/// Configuration for one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub inputs: InputFiles,
    pub outputs: OutputFiles,

    /// Handling of partials and includes whose target is missing
    pub unresolved: Unresolved,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            inputs: InputFiles::default(),
            outputs: OutputFiles::default(),
            unresolved: Unresolved::default(),
        }
    }
}

impl GeneratorConfig {
    /// Read a TOML config; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let inputs = [
            ("baseline", &self.inputs.baseline),
            ("sources", &self.inputs.sources),
            ("removed_types", &self.inputs.removed_types),
            ("added_types", &self.inputs.added_types),
            ("overriding_types", &self.inputs.overriding_types),
            ("comments", &self.inputs.comments),
            ("known_types", &self.inputs.known_types),
            ("idl_dir", &self.inputs.idl_dir),
        ];
        let outputs = [
            ("web", &self.outputs.web),
            ("worker", &self.outputs.worker),
            ("iterators", &self.outputs.iterators),
        ];

        for (key, name) in inputs.iter().chain(outputs.iter()) {
            if name.trim().is_empty() {
                return Err(format!("{key} must not be empty"));
            }
        }

        for (i, (key, name)) in outputs.iter().enumerate() {
            if let Some((other, _)) = outputs[i + 1..].iter().find(|(_, n)| n == name) {
                return Err(format!("outputs {key} and {other} both write {name}"));
            }
        }

        Ok(())
    }

    pub fn input(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    /// Converted fragment for an IDL source
    pub fn fragment_path(&self, title: &str) -> PathBuf {
        self.input_dir
            .join(&self.inputs.idl_dir)
            .join(format!("{title}.widl.json"))
    }

    /// Optional per-source comment map
    pub fn comment_map_path(&self, title: &str) -> PathBuf {
        self.input_dir
            .join(&self.inputs.idl_dir)
            .join(format!("{title}.commentmap.json"))
    }

    pub fn web_output(&self) -> PathBuf {
        self.output_dir.join(&self.outputs.web)
    }

    pub fn worker_output(&self) -> PathBuf {
        self.output_dir.join(&self.outputs.worker)
    }

    pub fn iterators_output(&self) -> PathBuf {
        self.output_dir.join(&self.outputs.iterators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.web_output(),
            PathBuf::from("generated/dom.generated.d.ts")
        );
        assert_eq!(
            config.fragment_path("dom"),
            PathBuf::from("inputfiles/idl/dom.widl.json")
        );
    }

    #[test]
    fn test_empty_names_rejected() {
        let mut config = GeneratorConfig::default();
        config.inputs.comments = "  ".to_string();
        assert_eq!(config.validate().unwrap_err(), "comments must not be empty");
    }

    #[test]
    fn test_identical_outputs_rejected() {
        let mut config = GeneratorConfig::default();
        config.outputs.iterators = config.outputs.web.clone();
        let err = config.validate().unwrap_err();
        assert!(err.contains("web and iterators"), "{err}");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("domgen.toml");
        fs::write(
            &path,
            r#"
output_dir = "out"
unresolved = "fail"

[outputs]
web = "dom.d.ts"
"#,
        )
        .unwrap();

        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.input_dir, PathBuf::from(DEFAULT_INPUT_DIR));
        assert_eq!(config.outputs.web, "dom.d.ts");
        assert_eq!(config.outputs.worker, "webworker.generated.d.ts");
        assert_eq!(config.unresolved, Unresolved::Fail);
    }

    #[test]
    fn test_unknown_config_file_errors() {
        let dir = tempdir().unwrap();
        assert!(GeneratorConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
