use crate::error::{GraphError, Result};
use crate::exposure::{resolve_exposure, ExposureMode};
use crate::merge::{merge, merge_dictionary_members, merge_members, MergePolicy};
use crate::prune::{prune, Template};
use crate::types::{Dictionary, Interface, WebIdl};
use serde::{Deserialize, Serialize};

/// One converted IDL source unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub deprecated: bool,

    /// Complete (non-partial) definitions
    #[serde(default)]
    pub browser: WebIdl,

    #[serde(default)]
    pub partial_interfaces: Vec<Interface>,

    /// `partial interface mixin` blocks
    #[serde(default)]
    pub partial_mixins: Vec<Interface>,

    #[serde(default)]
    pub partial_dictionaries: Vec<Dictionary>,

    #[serde(default)]
    pub includes: Vec<Include>,
}

impl Fragment {
    /// Parse a converted fragment and fill member names from their keys
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let mut fragment: Fragment = serde_json::from_value(value)?;
        fragment.browser.assign_names();
        for partial in fragment
            .partial_interfaces
            .iter_mut()
            .chain(fragment.partial_mixins.iter_mut())
        {
            partial.assign_member_names();
        }
        for partial in &mut fragment.partial_dictionaries {
            partial.assign_member_names();
        }
        Ok(fragment)
    }
}

/// `target includes mixin;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    pub target: String,
    pub includes: String,
}

/// Hand-maintained corrections applied after all fragments are folded
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub removals: Template,
    pub additions: WebIdl,
    pub overrides: WebIdl,
    pub comments: WebIdl,
}

/// What to do with partials and includes whose target does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unresolved {
    /// Drop silently; fragment sets evolve independently
    #[default]
    Skip,
    Fail,
}

impl Unresolved {
    fn check(self, kind: &'static str, name: &str) -> Result<()> {
        match self {
            Self::Skip => Ok(()),
            Self::Fail => Err(GraphError::Unresolved {
                kind,
                name: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegratorOptions {
    #[serde(default)]
    pub unresolved: Unresolved,
}

/// Counters gathered while integrating; the caller decides whether to log them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationReport {
    pub fragments: usize,
    pub deprecated_fragments: usize,
    pub partials_folded: usize,
    pub partials_skipped: usize,
    pub includes_folded: usize,
    pub includes_skipped: usize,
    pub exposure_overrides: usize,
}

#[derive(Debug, Clone)]
pub struct Integrated {
    pub graph: WebIdl,
    pub report: IntegrationReport,
}

/// Collection a partial target can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Interfaces,
    Mixins,
}

impl Collection {
    pub fn get<'a>(self, graph: &'a WebIdl, name: &str) -> Option<&'a Interface> {
        match self {
            Self::Interfaces => graph.interface(name),
            Self::Mixins => graph.mixin(name),
        }
    }

    pub fn get_mut<'a>(self, graph: &'a mut WebIdl, name: &str) -> Option<&'a mut Interface> {
        match self {
            Self::Interfaces => graph.interface_mut(name),
            Self::Mixins => graph.mixin_mut(name),
        }
    }
}

/// Partial interfaces fall back to mixins for fragments written before
/// `partial interface mixin` existed. An interface wins over a mixin of the same name.
pub const PARTIAL_INTERFACE_TARGETS: &[Collection] = &[Collection::Interfaces, Collection::Mixins];

pub const PARTIAL_MIXIN_TARGETS: &[Collection] = &[Collection::Mixins];

/// First collection in `chain` holding `name`
pub fn locate<'g>(graph: &'g mut WebIdl, name: &str, chain: &[Collection]) -> Option<&'g mut Interface> {
    let hit = chain
        .iter()
        .copied()
        .find(|collection| collection.get(graph, name).is_some())?;
    hit.get_mut(graph, name)
}

/// Runs the integration phases in order over one accumulating graph
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    options: IntegratorOptions,
}

impl Integrator {
    pub fn new(options: IntegratorOptions) -> Self {
        Self { options }
    }

    pub fn integrate(
        &self,
        baseline: WebIdl,
        fragments: Vec<Fragment>,
        templates: &Templates,
    ) -> Result<Integrated> {
        let mut report = IntegrationReport {
            fragments: fragments.len(),
            deprecated_fragments: fragments.iter().filter(|f| f.deprecated).count(),
            ..IntegrationReport::default()
        };

        let fragments: Vec<Fragment> = fragments.into_iter().map(stamp_deprecated).collect();

        log::debug!("Merging {} standard fragments", fragments.len());
        let graph = merge_standard(baseline, &fragments)?;

        log::debug!("Folding partials");
        let graph = fold_partials(graph, &fragments, self.options, &mut report)?;

        log::debug!("Folding includes");
        let graph = fold_includes(graph, &fragments, self.options, &mut report)?;

        log::debug!("Pruning removed types");
        let graph = prune(&graph, &templates.removals)?;

        log::debug!("Merging added types");
        let graph = merge_additions(graph, &templates.additions)?;

        log::debug!("Merging overriding types");
        let graph = merge_overrides(graph, &templates.overrides)?;

        log::debug!("Merging comments");
        let graph = merge_comments(graph, &templates.comments)?;

        log::debug!("Resolving exposure overrides");
        let (graph, overridden) = apply_exposure_overrides(graph)?;
        report.exposure_overrides = overridden;

        Ok(Integrated { graph, report })
    }
}

/// Mark every interface, partial interface, and partial mixin of a deprecated fragment
pub fn stamp_deprecated(mut fragment: Fragment) -> Fragment {
    if !fragment.deprecated {
        return fragment;
    }
    for interface in fragment.browser.interfaces_mut() {
        mark_deprecated(interface);
    }
    for partial in fragment
        .partial_interfaces
        .iter_mut()
        .chain(fragment.partial_mixins.iter_mut())
    {
        mark_deprecated(partial);
    }
    fragment
}

fn mark_deprecated(interface: &mut Interface) {
    interface.deprecated = Some(true);
    if let Some(methods) = interface.methods.as_mut() {
        for method in methods.method.values_mut() {
            method.deprecated = Some(true);
        }
    }
    if let Some(properties) = interface.properties.as_mut() {
        for property in properties.property.values_mut() {
            property.deprecated = Some(true);
        }
    }
}

pub fn merge_standard(graph: WebIdl, fragments: &[Fragment]) -> Result<WebIdl> {
    fragments.iter().try_fold(graph, |graph, fragment| {
        merge(graph, fragment.browser.clone(), MergePolicy::STANDARD)
    })
}

pub fn fold_partials(
    mut graph: WebIdl,
    fragments: &[Fragment],
    options: IntegratorOptions,
    report: &mut IntegrationReport,
) -> Result<WebIdl> {
    for fragment in fragments {
        for partial in &fragment.partial_interfaces {
            fold_partial(&mut graph, partial.clone(), PARTIAL_INTERFACE_TARGETS, options, report)?;
        }
        for partial in &fragment.partial_mixins {
            fold_partial(&mut graph, partial.clone(), PARTIAL_MIXIN_TARGETS, options, report)?;
        }
        for partial in &fragment.partial_dictionaries {
            match graph.dictionary_mut(&partial.name) {
                Some(base) => {
                    merge_dictionary_members(base, partial.clone(), MergePolicy::OVERRIDE)?;
                    report.partials_folded += 1;
                }
                None => {
                    options.unresolved.check("partial dictionary", &partial.name)?;
                    report.partials_skipped += 1;
                }
            }
        }
    }
    Ok(graph)
}

fn fold_partial(
    graph: &mut WebIdl,
    mut partial: Interface,
    chain: &[Collection],
    options: IntegratorOptions,
    report: &mut IntegrationReport,
) -> Result<()> {
    let Some(base) = locate(graph, &partial.name, chain) else {
        options.unresolved.check("partial interface", &partial.name)?;
        report.partials_skipped += 1;
        return Ok(());
    };

    // A tagged partial spreads its own exposure; an untagged one takes the base's
    let own = partial.exposed.clone().filter(|e| !e.is_empty());
    if let Some(exposed) = own.as_ref().or(base.exposed.as_ref().filter(|e| !e.is_empty())) {
        resolve_exposure(&mut partial, exposed, ExposureMode::Inherit)?;
    }
    merge_members(base, partial, MergePolicy::OVERRIDE)?;
    report.partials_folded += 1;
    Ok(())
}

pub fn fold_includes(
    mut graph: WebIdl,
    fragments: &[Fragment],
    options: IntegratorOptions,
    report: &mut IntegrationReport,
) -> Result<WebIdl> {
    for include in fragments.iter().flat_map(|f| &f.includes) {
        match graph.interface_mut(&include.target) {
            Some(target) => {
                target
                    .implements
                    .get_or_insert_with(Vec::new)
                    .push(include.includes.clone());
                report.includes_folded += 1;
            }
            None => {
                options.unresolved.check("includes", &include.target)?;
                report.includes_skipped += 1;
            }
        }
    }
    Ok(graph)
}

/// Additions may introduce nodes anywhere but never touch existing ones
pub fn merge_additions(graph: WebIdl, additions: &WebIdl) -> Result<WebIdl> {
    merge(graph, additions.clone(), MergePolicy::ADDITIVE)
}

pub fn merge_overrides(graph: WebIdl, overrides: &WebIdl) -> Result<WebIdl> {
    merge(graph, overrides.clone(), MergePolicy::OVERRIDE)
}

pub fn merge_comments(graph: WebIdl, comments: &WebIdl) -> Result<WebIdl> {
    merge(graph, comments.clone(), MergePolicy::OVERRIDE)
}

/// Force each `override-exposed` directive onto its interface; returns how many applied
pub fn apply_exposure_overrides(mut graph: WebIdl) -> Result<(WebIdl, usize)> {
    let mut applied = 0;
    for interface in graph.interfaces_mut() {
        if let Some(exposure) = interface.override_exposed.clone() {
            resolve_exposure(interface, &exposure, ExposureMode::Force)?;
            applied += 1;
        }
    }
    Ok((graph, applied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Exposure;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> WebIdl {
        WebIdl::from_value(value).unwrap()
    }

    fn partial(value: serde_json::Value) -> Interface {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_partial_falls_back_to_mixin() {
        let base = graph(json!({ "mixins": { "mixin": { "M": { "methods": { "method": { "a": {} } } } } } }));
        let fragment = Fragment {
            partial_interfaces: vec![partial(json!({ "name": "M", "methods": { "method": { "b": {} } } }))],
            ..Fragment::default()
        };

        let mut report = IntegrationReport::default();
        let out = fold_partials(base, &[fragment], IntegratorOptions::default(), &mut report).unwrap();
        let m = out.mixin("M").unwrap();
        assert!(m.method("a").is_some() && m.method("b").is_some());
        assert_eq!(report.partials_folded, 1);
    }

    #[test]
    fn test_interface_wins_over_mixin_with_same_name() {
        let base = graph(json!({
            "interfaces": { "interface": { "X": {} } },
            "mixins": { "mixin": { "X": {} } }
        }));
        let fragment = Fragment {
            partial_interfaces: vec![partial(json!({ "name": "X", "methods": { "method": { "f": {} } } }))],
            ..Fragment::default()
        };

        let out = fold_partials(base, &[fragment], IntegratorOptions::default(), &mut IntegrationReport::default()).unwrap();
        assert!(out.interface("X").unwrap().method("f").is_some());
        assert!(out.mixin("X").unwrap().method("f").is_none());
    }

    #[test]
    fn test_partial_mixin_ignores_interfaces() {
        let base = graph(json!({ "interfaces": { "interface": { "X": {} } } }));
        let fragment = Fragment {
            partial_mixins: vec![partial(json!({ "name": "X", "methods": { "method": { "f": {} } } }))],
            ..Fragment::default()
        };

        let mut report = IntegrationReport::default();
        let out = fold_partials(base, &[fragment], IntegratorOptions::default(), &mut report).unwrap();
        assert!(out.interface("X").unwrap().method("f").is_none());
        assert_eq!(report.partials_skipped, 1);
    }

    #[test]
    fn test_tagged_partial_spreads_its_own_exposure() {
        let base = graph(json!({ "interfaces": { "interface": { "Foo": { "exposed": "Window Worker" } } } }));
        let fragment = Fragment {
            partial_interfaces: vec![
                partial(json!({ "name": "Foo", "methods": { "method": { "plain": {} } } })),
                partial(json!({ "name": "Foo", "exposed": "Window", "methods": { "method": { "tagged": {} } } })),
            ],
            ..Fragment::default()
        };

        let out = fold_partials(base, &[fragment], IntegratorOptions::default(), &mut IntegrationReport::default()).unwrap();
        let foo = out.interface("Foo").unwrap();
        assert_eq!(foo.method("plain").unwrap().exposed, Some(Exposure::new(["Window", "Worker"])));
        assert_eq!(foo.method("tagged").unwrap().exposed, Some(Exposure::new(["Window"])));
        assert_eq!(foo.exposed, Some(Exposure::new(["Window", "Worker"])));
    }

    #[test]
    fn test_unresolved_policy() {
        let fragment = Fragment {
            partial_dictionaries: vec![Dictionary {
                name: "Missing".into(),
                ..Dictionary::default()
            }],
            includes: vec![Include {
                target: "Nowhere".into(),
                includes: "M".into(),
            }],
            ..Fragment::default()
        };

        let mut report = IntegrationReport::default();
        let skip = IntegratorOptions::default();
        let out = fold_partials(WebIdl::default(), std::slice::from_ref(&fragment), skip, &mut report).unwrap();
        let out = fold_includes(out, std::slice::from_ref(&fragment), skip, &mut report).unwrap();
        assert_eq!(out, WebIdl::default());
        assert_eq!((report.partials_skipped, report.includes_skipped), (1, 1));

        let fail = IntegratorOptions {
            unresolved: Unresolved::Fail,
        };
        let err = fold_includes(WebIdl::default(), &[fragment], fail, &mut report).unwrap_err();
        assert!(matches!(err, GraphError::Unresolved { kind: "includes", .. }));
    }

    #[test]
    fn test_includes_append_in_fragment_order() {
        let base = graph(json!({ "interfaces": { "interface": { "Doc": { "implements": ["A"] } } } }));
        let first = Fragment {
            includes: vec![Include { target: "Doc".into(), includes: "B".into() }],
            ..Fragment::default()
        };
        let second = Fragment {
            includes: vec![Include { target: "Doc".into(), includes: "C".into() }],
            ..Fragment::default()
        };

        let out = fold_includes(base, &[first, second], IntegratorOptions::default(), &mut IntegrationReport::default()).unwrap();
        assert_eq!(
            out.interface("Doc").unwrap().implements,
            Some(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
    }

    #[test]
    fn test_stamp_deprecated_marks_members() {
        let fragment = Fragment {
            deprecated: true,
            browser: graph(json!({ "interfaces": { "interface": { "Old": {
                "methods": { "method": { "m": {} } },
                "properties": { "property": { "p": { "type": "long" } } }
            } } } })),
            partial_interfaces: vec![partial(json!({ "name": "Other", "methods": { "method": { "q": {} } } }))],
            partial_mixins: vec![partial(json!({ "name": "Mix", "properties": { "property": { "r": { "type": "long" } } } }))],
            ..Fragment::default()
        };

        let stamped = stamp_deprecated(fragment);
        let old = stamped.browser.interface("Old").unwrap();
        assert!(old.is_deprecated());
        assert_eq!(old.method("m").unwrap().deprecated, Some(true));
        assert_eq!(old.property("p").unwrap().deprecated, Some(true));
        assert!(stamped.partial_interfaces[0].is_deprecated());
        assert_eq!(stamped.partial_interfaces[0].method("q").unwrap().deprecated, Some(true));
        assert!(stamped.partial_mixins[0].is_deprecated());
        assert_eq!(stamped.partial_mixins[0].property("r").unwrap().deprecated, Some(true));
    }

    #[test]
    fn test_fragment_reads_camel_case() {
        let fragment = Fragment::from_value(json!({
            "browser": { "interfaces": { "interface": { "B": {} } } },
            "partialInterfaces": [{ "name": "A", "methods": { "method": { "m": {} } } }],
            "partialMixins": [],
            "partialDictionaries": [{ "name": "D" }],
            "includes": [{ "target": "A", "includes": "M" }]
        }))
        .unwrap();

        assert_eq!(fragment.browser.interface("B").unwrap().name, "B");
        assert_eq!(fragment.partial_interfaces[0].method("m").unwrap().name, "m");
        assert_eq!(fragment.partial_dictionaries[0].name, "D");
        assert_eq!(fragment.includes[0].includes, "M");
    }
}
