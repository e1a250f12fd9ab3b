use crate::config::GeneratorConfig;
use anyhow::{Context, Result};
use domgen_emit::KnownTypes;
use domgen_graph::{Fragment, Interface, Template, Templates, WebIdl};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One entry of the IDL source list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdlSource {
    #[serde(default)]
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub deprecated: bool,
}

/// `Name` or `Name.member` to documentation text
pub type CommentMap = BTreeMap<String, String>;

/// Produces the fragment for an IDL source
pub trait IdlConverter {
    fn convert(&self, source: &IdlSource, comments: &CommentMap) -> Result<Fragment>;
}

/// Reads fragments already converted to JSON by the external IDL parser
pub struct JsonIdlConverter<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> JsonIdlConverter<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }
}

impl IdlConverter for JsonIdlConverter<'_> {
    fn convert(&self, source: &IdlSource, comments: &CommentMap) -> Result<Fragment> {
        let path = self.config.fragment_path(&source.title);
        if source.url.is_empty() {
            log::debug!("Reading {} from {}", source.title, path.display());
        } else {
            log::debug!("Reading {} ({}) from {}", source.title, source.url, path.display());
        }
        let value: serde_json::Value = read_json(&path)?;
        let mut fragment = Fragment::from_value(value)
            .with_context(|| format!("Invalid fragment {}", path.display()))?;
        fragment.title = source.title.clone();
        fragment.deprecated = source.deprecated;
        apply_comments(&mut fragment, comments);
        Ok(fragment)
    }
}

/// Everything a run reads before integration starts
#[derive(Debug, Clone)]
pub struct Inputs {
    pub baseline: WebIdl,
    pub fragments: Vec<Fragment>,
    pub templates: Templates,
    pub known: KnownTypes,
}

pub fn load_inputs(config: &GeneratorConfig, converter: &dyn IdlConverter) -> Result<Inputs> {
    let inputs = &config.inputs;
    let baseline = read_graph(&config.input(&inputs.baseline))?;
    let sources: Vec<IdlSource> = read_json(&config.input(&inputs.sources))?;

    let mut fragments = Vec::with_capacity(sources.len());
    for source in &sources {
        let comments = read_comment_map(&config.comment_map_path(&source.title))?;
        let fragment = converter
            .convert(source, &comments)
            .with_context(|| format!("Failed to convert {}", source.title))?;
        fragments.push(fragment);
    }
    log::info!("Loaded {} IDL fragments", fragments.len());

    let removals_path = config.input(&inputs.removed_types);
    let removals = Template::from_value(read_json(&removals_path)?)
        .with_context(|| format!("Invalid removal template {}", removals_path.display()))?;

    let templates = Templates {
        removals,
        additions: read_graph(&config.input(&inputs.added_types))?,
        overrides: read_graph(&config.input(&inputs.overriding_types))?,
        comments: read_graph(&config.input(&inputs.comments))?,
    };
    let known = read_json(&config.input(&inputs.known_types))?;

    Ok(Inputs {
        baseline,
        fragments,
        templates,
        known,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_graph(path: &Path) -> Result<WebIdl> {
    let value = read_json(path)?;
    WebIdl::from_value(value).with_context(|| format!("Invalid graph {}", path.display()))
}

/// A missing comment map means no comments
pub fn read_comment_map(path: &Path) -> Result<CommentMap> {
    if !path.exists() {
        return Ok(CommentMap::new());
    }
    read_json(path)
}

/// Fill missing comments on fragment entries from `comments`
pub fn apply_comments(fragment: &mut Fragment, comments: &CommentMap) {
    if comments.is_empty() {
        return;
    }
    let lookup = |key: String| comments.get(&key).cloned();

    for entry in fragment
        .browser
        .interfaces_mut()
        .chain(fragment.partial_interfaces.iter_mut())
        .chain(fragment.partial_mixins.iter_mut())
    {
        comment_interface(entry, &lookup);
    }
    if let Some(mixins) = fragment.browser.mixins.as_mut() {
        for entry in mixins.mixin.values_mut() {
            comment_interface(entry, &lookup);
        }
    }
    let dictionaries = fragment
        .browser
        .dictionaries
        .iter_mut()
        .flat_map(|d| d.dictionary.values_mut())
        .chain(fragment.partial_dictionaries.iter_mut());
    for dictionary in dictionaries {
        fill(&mut dictionary.comment, lookup(dictionary.name.clone()));
        let name = dictionary.name.clone();
        for member in dictionary.members.iter_mut().flat_map(|m| m.member.values_mut()) {
            fill(&mut member.comment, lookup(format!("{name}.{}", member.name)));
        }
    }
}

fn comment_interface(entry: &mut Interface, lookup: &impl Fn(String) -> Option<String>) {
    let name = entry.name.clone();
    fill(&mut entry.comment, lookup(name.clone()));
    for method in entry.methods.iter_mut().flat_map(|m| m.method.values_mut()) {
        fill(&mut method.comment, lookup(format!("{name}.{}", method.name)));
    }
    for property in entry.properties.iter_mut().flat_map(|p| p.property.values_mut()) {
        fill(&mut property.comment, lookup(format!("{name}.{}", property.name)));
    }
    for constant in entry.constants.iter_mut().flat_map(|c| c.constant.values_mut()) {
        fill(&mut constant.comment, lookup(format!("{name}.{}", constant.name)));
    }
}

fn fill(slot: &mut Option<String>, comment: Option<String>) {
    if slot.is_none() {
        *slot = comment;
    }
}
