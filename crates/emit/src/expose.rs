//! Per-context view of a finished graph.
//!
//! Interfaces and namespaces are selected by exposure; every other kind of
//! entry is kept only when something selected refers to it, directly or
//! through a chain of type references.

use crate::error::{EmitError, Result};
use domgen_graph::{
    effective_exposure, CallbackFunctions, CallbackInterfaces, Dictionaries, Dictionary, Enums,
    Exposure, Interface, Mixins, Signature, TypeDef, TypeDefs, WebIdl,
};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Context assumed for entries that carry no exposure
pub const DEFAULT_CONTEXT: &str = "Window";

/// Names emitted for a context even when nothing references them
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KnownTypes {
    #[serde(rename = "Window", default)]
    pub window: Vec<String>,

    #[serde(rename = "Worker", default)]
    pub worker: Vec<String>,
}

impl KnownTypes {
    pub fn for_context(&self, context: &str) -> &[String] {
        if context.ends_with("Worker") {
            &self.worker
        } else {
            &self.window
        }
    }
}

/// Whether an entry with this exposure is visible in `context`
///
/// `Worker` also covers the specialised worker contexts (`DedicatedWorker`,
/// `ServiceWorker`, ...).
pub fn is_exposed_in(exposure: Option<&Exposure>, context: &str) -> bool {
    match exposure.filter(|e| !e.is_empty()) {
        None => context == DEFAULT_CONTEXT,
        Some(exposure) => exposure
            .contexts()
            .iter()
            .any(|tag| tag == context || (context == "Worker" && tag.ends_with("Worker"))),
    }
}

/// Extract the part of `graph` visible in `context`
pub fn exposed_types(graph: &WebIdl, context: &str, known: &[String]) -> Result<WebIdl> {
    if context.trim().is_empty() {
        return Err(EmitError::EmptyContext);
    }
    let forced: HashSet<&str> = known.iter().map(String::as_str).collect();

    let mut view = WebIdl {
        extra: graph.extra.clone(),
        ..WebIdl::default()
    };

    for entry in graph.interfaces() {
        let exposed = is_exposed_in(entry.exposed.as_ref(), context);
        if exposed || forced.contains(entry.name.as_str()) {
            view.interface_map_mut()
                .insert(entry.name.clone(), scoped(entry, context, exposed));
        }
    }
    let namespaces: Vec<Interface> = graph
        .namespaces
        .iter()
        .flatten()
        .filter(|ns| is_exposed_in(ns.exposed.as_ref(), context) || forced.contains(ns.name.as_str()))
        .map(|ns| scoped(ns, context, true))
        .collect();
    if !namespaces.is_empty() {
        view.namespaces = Some(namespaces);
    }

    let mixins: BTreeMap<String, Interface> = graph
        .mixins()
        .map(|m| (m.name.clone(), scoped(m, context, true)))
        .collect();

    let mut types = TypeGraph::default();
    for entry in view.interfaces().chain(view.namespaces.iter().flatten()) {
        types.link(&entry.name, interface_refs(entry));
    }
    for entry in mixins.values() {
        types.link(&entry.name, interface_refs(entry));
    }
    for entry in graph.callback_interfaces.iter().flat_map(|c| c.interface.values()) {
        types.link(&entry.name, interface_refs(entry));
    }
    for entry in graph.dictionaries() {
        types.link(&entry.name, dictionary_refs(entry));
    }
    for entry in graph.typedefs.iter().flat_map(|t| &t.typedef) {
        types.link(&entry.new_type, entry.ty.referenced_names());
    }
    for entry in graph.callback_functions.iter().flat_map(|c| c.callback_function.values()) {
        let mut refs = Vec::new();
        for signature in &entry.signature {
            signature_refs(signature, &mut refs);
        }
        types.link(&entry.name, refs);
    }

    let roots = view
        .interfaces()
        .chain(view.namespaces.iter().flatten())
        .map(|entry| entry.name.as_str())
        .chain(forced.iter().copied());
    let reachable = types.reachable(roots);
    log::debug!("{} names reachable in {context}", reachable.len());

    let wanted = |name: &str| reachable.contains(name);

    let mixins: BTreeMap<_, _> = mixins.into_iter().filter(|(name, _)| wanted(name)).collect();
    if !mixins.is_empty() {
        view.mixins = Some(Mixins { mixin: mixins });
    }

    if let Some(source) = &graph.callback_interfaces {
        let interface = keep(&source.interface, wanted);
        if !interface.is_empty() {
            view.callback_interfaces = Some(CallbackInterfaces { interface });
        }
    }
    if let Some(source) = &graph.dictionaries {
        let dictionary: BTreeMap<String, Dictionary> = keep(&source.dictionary, wanted);
        if !dictionary.is_empty() {
            view.dictionaries = Some(Dictionaries { dictionary });
        }
    }
    if let Some(source) = &graph.enums {
        let entries = keep(&source.entries, wanted);
        if !entries.is_empty() {
            view.enums = Some(Enums { entries });
        }
    }
    if let Some(source) = &graph.callback_functions {
        let callback_function = keep(&source.callback_function, wanted);
        if !callback_function.is_empty() {
            view.callback_functions = Some(CallbackFunctions { callback_function });
        }
    }
    if let Some(source) = &graph.typedefs {
        let typedef: Vec<TypeDef> = source
            .typedef
            .iter()
            .filter(|t| wanted(&t.new_type))
            .cloned()
            .collect();
        if !typedef.is_empty() {
            view.typedefs = Some(TypeDefs { typedef });
        }
    }

    Ok(view)
}

fn keep<T: Clone>(
    source: &BTreeMap<String, T>,
    wanted: impl Fn(&str) -> bool,
) -> BTreeMap<String, T> {
    source
        .iter()
        .filter(|(name, _)| wanted(name))
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect()
}

/// Copy of `entry` without the members hidden from `context`
///
/// Members of an entry kept only because it is a known type do not inherit
/// the entry's exposure; only their own tags can hide them.
fn scoped(entry: &Interface, context: &str, inherit: bool) -> Interface {
    let mut entry = entry.clone();
    let parent = if inherit { entry.exposed.clone() } else { None };
    let visible = |own: Option<&Exposure>| match effective_exposure(own, parent.as_ref()) {
        None => true,
        exposure => is_exposed_in(exposure, context),
    };

    if let Some(constants) = entry.constants.as_mut() {
        constants.constant.retain(|_, c| visible(c.exposed.as_ref()));
    }
    if let Some(methods) = entry.methods.as_mut() {
        methods.method.retain(|_, m| visible(m.exposed.as_ref()));
    }
    if let Some(properties) = entry.properties.as_mut() {
        properties.property.retain(|_, p| visible(p.exposed.as_ref()));
    }
    if entry
        .constructor
        .as_ref()
        .is_some_and(|c| !visible(c.exposed.as_ref()))
    {
        entry.constructor = None;
    }
    entry
}

/// Directed "refers to" graph over entry names
#[derive(Default)]
struct TypeGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TypeGraph {
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn link<'a>(&mut self, from: &str, to: impl IntoIterator<Item = &'a str>) {
        let from = self.node(from);
        for name in to {
            let target = self.node(name);
            self.graph.update_edge(from, target, ());
        }
    }

    fn reachable<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        let mut seen = HashSet::new();
        for root in roots {
            let Some(&start) = self.index.get(root) else {
                continue;
            };
            if seen.contains(&self.graph[start]) {
                continue;
            }
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(idx) = dfs.next(&self.graph) {
                seen.insert(self.graph[idx].clone());
            }
        }
        seen
    }
}

fn interface_refs(entry: &Interface) -> Vec<&str> {
    let mut refs: Vec<&str> = entry.extends.iter().map(String::as_str).collect();
    refs.extend(entry.implements.iter().flatten().map(String::as_str));
    for constant in entry.constants.iter().flat_map(|c| c.constant.values()) {
        refs.extend(constant.ty.referenced_names());
    }
    for property in entry.properties.iter().flat_map(|p| p.property.values()) {
        refs.extend(property.ty.referenced_names());
    }
    for method in entry.methods.iter().flat_map(|m| m.method.values()) {
        for signature in &method.signature {
            signature_refs(signature, &mut refs);
        }
    }
    for signature in entry.constructor.iter().flat_map(|c| &c.signature) {
        signature_refs(signature, &mut refs);
    }
    for typed in entry.iterator.iter().flat_map(|i| &i.ty) {
        refs.extend(typed.referenced_names());
    }
    refs
}

fn dictionary_refs(entry: &Dictionary) -> Vec<&str> {
    let mut refs: Vec<&str> = entry.extends.iter().map(String::as_str).collect();
    for member in entry.members.iter().flat_map(|m| m.member.values()) {
        refs.extend(member.ty.referenced_names());
    }
    refs
}

fn signature_refs<'a>(signature: &'a Signature, refs: &mut Vec<&'a str>) {
    refs.extend(signature.ty.referenced_names());
    for param in &signature.param {
        refs.extend(param.ty.referenced_names());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> WebIdl {
        WebIdl::from_value(json!({
            "interfaces": { "interface": {
                "Document": {
                    "properties": { "property": {
                        "body": { "type": "HTMLElement" },
                        "options": { "type": "ElementCreationOptions", "exposed": "Window" }
                    } },
                    "implements": ["ParentNode"]
                },
                "WorkerNavigator": {
                    "exposed": "Worker",
                    "methods": { "method": {
                        "connect": { "signature": [{ "type": "Promise", "subtype": { "type": "ConnectInit" } }] },
                        "windowOnly": { "exposed": "Window", "signature": [{ "type": "undefined" }] }
                    } }
                },
                "Shared": { "exposed": "Window DedicatedWorker" }
            } },
            "mixins": { "mixin": { "ParentNode": { "properties": { "property": { "children": { "type": "long" } } } } } },
            "dictionaries": { "dictionary": {
                "ElementCreationOptions": { "members": { "member": { "is": { "type": "Mode" } } } },
                "ConnectInit": {},
                "Orphan": {}
            } },
            "enums": { "enum": { "Mode": { "value": ["open", "closed"] } } },
            "typedefs": { "typedef": [{ "new-type": "HTMLElement", "type": "Element" }] }
        }))
        .unwrap()
    }

    fn names<'a>(entries: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
        entries.map(String::as_str).collect()
    }

    #[test]
    fn test_worker_tag_matches_worker_subtypes() {
        let shared = Exposure::new(["Window", "DedicatedWorker"]);
        assert!(is_exposed_in(Some(&shared), "Worker"));
        assert!(is_exposed_in(Some(&shared), "Window"));
        assert!(!is_exposed_in(Some(&Exposure::new(["Worker"])), "Window"));
        assert!(is_exposed_in(None, "Window"));
        assert!(!is_exposed_in(None, "Worker"));
    }

    #[test]
    fn test_window_view_follows_type_references() {
        let view = exposed_types(&sample(), "Window", &[]).unwrap();

        assert_eq!(
            names(view.interfaces.as_ref().unwrap().interface.keys()),
            vec!["Document", "Shared"]
        );
        assert!(view.mixin("ParentNode").is_some());
        assert!(view.dictionary("ElementCreationOptions").is_some());
        assert!(view.dictionary("Orphan").is_none());
        assert!(view.dictionary("ConnectInit").is_none());
        assert!(view.enumeration("Mode").is_some());
        assert!(view.typedef("HTMLElement").is_some());
    }

    #[test]
    fn test_worker_view_drops_hidden_members() {
        let view = exposed_types(&sample(), "Worker", &[]).unwrap();

        assert_eq!(
            names(view.interfaces.as_ref().unwrap().interface.keys()),
            vec!["Shared", "WorkerNavigator"]
        );
        let navigator = view.interface("WorkerNavigator").unwrap();
        assert!(navigator.method("connect").is_some());
        assert!(navigator.method("windowOnly").is_none());
        assert!(view.dictionary("ConnectInit").is_some());
        assert!(view.enumeration("Mode").is_none());
    }

    #[test]
    fn test_known_types_are_forced_in() {
        let known = vec!["Orphan".to_string(), "Document".to_string()];
        let view = exposed_types(&sample(), "Worker", &known).unwrap();

        assert!(view.dictionary("Orphan").is_some());
        let document = view.interface("Document").unwrap();
        assert!(document.property("body").is_some());
        assert!(document.property("options").is_none());
    }

    #[test]
    fn test_empty_context_is_rejected() {
        assert!(matches!(
            exposed_types(&sample(), " ", &[]),
            Err(EmitError::EmptyContext)
        ));
    }

    #[test]
    fn test_known_types_pick_list_by_context() {
        let known: KnownTypes = serde_json::from_value(json!({ "Window": ["A"], "Worker": ["B"] })).unwrap();
        assert_eq!(known.for_context("Window"), ["A".to_string()]);
        assert_eq!(known.for_context("ServiceWorker"), ["B".to_string()]);
    }
}
