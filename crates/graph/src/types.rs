use crate::error::Result;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Fields the model does not name explicitly; carried through every phase untouched
pub type Extra = Map<String, Value>;

/// Unified interface graph (one generation run)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebIdl {
    #[serde(
        rename = "callback-functions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_functions: Option<CallbackFunctions>,

    #[serde(
        rename = "callback-interfaces",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_interfaces: Option<CallbackInterfaces>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionaries: Option<Dictionaries>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<Enums>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Interfaces>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixins: Option<Mixins>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typedefs: Option<TypeDefs>,

    /// Namespaces are an array of interface-shaped items identified by `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<Interface>>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interfaces {
    #[serde(default)]
    pub interface: BTreeMap<String, Interface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackInterfaces {
    #[serde(default)]
    pub interface: BTreeMap<String, Interface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mixins {
    #[serde(default)]
    pub mixin: BTreeMap<String, Interface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionaries {
    #[serde(default)]
    pub dictionary: BTreeMap<String, Dictionary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enums {
    #[serde(rename = "enum", default)]
    pub entries: BTreeMap<String, Enum>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackFunctions {
    #[serde(rename = "callback-function", default)]
    pub callback_function: BTreeMap<String, CallbackFunction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefs {
    #[serde(default)]
    pub typedef: Vec<TypeDef>,
}

/// Interface, mixin, callback interface, or namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<Constants>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Methods>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<Constructor>,

    /// Contexts the interface is visible in; `None` means unspecified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed: Option<Exposure>,

    /// Replaces `exposed` (interface and members) in the last integration phase
    #[serde(
        rename = "override-exposed",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub override_exposed: Option<Exposure>,

    /// Mixins this interface includes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator: Option<IteratorDecl>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    #[serde(default)]
    pub constant: BTreeMap<String, Constant>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Methods {
    #[serde(default)]
    pub method: BTreeMap<String, Method>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub property: BTreeMap<String, Property>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Members {
    #[serde(default)]
    pub member: BTreeMap<String, Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub ty: Typed,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed: Option<Exposure>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Operation; overloads share one entry and differ by signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Method {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<Signature>,

    #[serde(
        rename = "static",
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_static: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed: Option<Exposure>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub ty: Typed,

    #[serde(
        rename = "read-only",
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub read_only: Option<bool>,

    #[serde(
        rename = "static",
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_static: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed: Option<Exposure>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constructor {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<Signature>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed: Option<Exposure>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(flatten)]
    pub ty: Typed,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub param: Vec<Param>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub ty: Typed,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional: Option<bool>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub variadic: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Members>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub ty: Typed,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub value: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackFunction {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<Signature>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(rename = "new-type", default)]
    pub new_type: String,

    #[serde(flatten)]
    pub ty: Typed,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// `iterable<…>`, `maplike<…>` or `setlike<…>` declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IteratorDecl {
    pub kind: String,

    #[serde(rename = "type", default)]
    pub ty: Vec<Typed>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub readonly: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// IDL type reference as it appears on properties, params, and signatures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Typed {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<Subtype>,

    #[serde(
        default,
        deserialize_with = "flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub nullable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeName {
    Named(String),
    Union(Vec<Typed>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subtype {
    Many(Vec<Typed>),
    One(Box<Typed>),
}

impl Typed {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            ty: Some(TypeName::Named(name.into())),
            ..Self::default()
        }
    }

    pub fn subtypes(&self) -> Vec<&Typed> {
        match &self.subtype {
            Some(Subtype::Many(items)) => items.iter().collect(),
            Some(Subtype::One(item)) => vec![item.as_ref()],
            None => Vec::new(),
        }
    }

    /// Every named type referenced, including union members and generic arguments
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.ty {
            Some(TypeName::Named(name)) => names.push(name.as_str()),
            Some(TypeName::Union(members)) => {
                for member in members {
                    member.collect_names(names);
                }
            }
            None => {}
        }
        for sub in self.subtypes() {
            sub.collect_names(names);
        }
    }
}

/// Ordered set of execution context names (`Window`, `Worker`, `DedicatedWorker`, ...)
///
/// Reads either the whitespace-separated string used by the data files or a
/// list; always writes the string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exposure(Vec<String>);

impl Exposure {
    pub fn new<I, S>(contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut exposure = Self::default();
        for context in contexts {
            exposure.insert(context);
        }
        exposure
    }

    /// Returns false when the context was already present or blank
    pub fn insert(&mut self, context: impl Into<String>) -> bool {
        let context = context.into();
        if context.trim().is_empty() || self.0.contains(&context) {
            return false;
        }
        self.0.push(context);
        true
    }

    pub fn extend(&mut self, other: Exposure) {
        for context in other.0 {
            self.insert(context);
        }
    }

    pub fn contains(&self, context: &str) -> bool {
        self.0.iter().any(|c| c == context)
    }

    pub fn contexts(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl Serialize for Exposure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Exposure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        match Raw::deserialize(deserializer) {
            Ok(Raw::Text(text)) => Ok(Self::new(text.split_whitespace())),
            Ok(Raw::List(list)) => Ok(Self::new(list)),
            Err(_) => Err(de::Error::custom(
                "exposure must be a string or a list of context names",
            )),
        }
    }
}

/// Boolean-ish attributes are written as `true` or `1` in the data files
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Bool(value) => value,
        Raw::Number(value) => value != 0,
    }))
}

impl WebIdl {
    /// Parse a graph or template document and fill entry names from their keys
    pub fn from_value(value: Value) -> Result<Self> {
        let mut graph: WebIdl = serde_json::from_value(value)?;
        graph.assign_names();
        Ok(graph)
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.as_ref()?.interface.get(name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.as_mut()?.interface.get_mut(name)
    }

    pub fn mixin(&self, name: &str) -> Option<&Interface> {
        self.mixins.as_ref()?.mixin.get(name)
    }

    pub fn mixin_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.mixins.as_mut()?.mixin.get_mut(name)
    }

    pub fn dictionary(&self, name: &str) -> Option<&Dictionary> {
        self.dictionaries.as_ref()?.dictionary.get(name)
    }

    pub fn dictionary_mut(&mut self, name: &str) -> Option<&mut Dictionary> {
        self.dictionaries.as_mut()?.dictionary.get_mut(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&Enum> {
        self.enums.as_ref()?.entries.get(name)
    }

    pub fn typedef(&self, name: &str) -> Option<&TypeDef> {
        self.typedefs
            .as_ref()?
            .typedef
            .iter()
            .find(|t| t.new_type == name)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter().flat_map(|c| c.interface.values())
    }

    pub fn interfaces_mut(&mut self) -> impl Iterator<Item = &mut Interface> {
        self.interfaces
            .iter_mut()
            .flat_map(|c| c.interface.values_mut())
    }

    pub fn mixins(&self) -> impl Iterator<Item = &Interface> {
        self.mixins.iter().flat_map(|c| c.mixin.values())
    }

    pub fn dictionaries(&self) -> impl Iterator<Item = &Dictionary> {
        self.dictionaries.iter().flat_map(|c| c.dictionary.values())
    }

    pub fn interface_map_mut(&mut self) -> &mut BTreeMap<String, Interface> {
        &mut self.interfaces.get_or_insert_with(Default::default).interface
    }

    pub fn dictionary_map_mut(&mut self) -> &mut BTreeMap<String, Dictionary> {
        &mut self
            .dictionaries
            .get_or_insert_with(Default::default)
            .dictionary
    }

    /// Templates may omit `name` on keyed entries; the map key is authoritative
    pub fn assign_names(&mut self) {
        if let Some(c) = self.interfaces.as_mut() {
            assign_interface_names(&mut c.interface);
        }
        if let Some(c) = self.mixins.as_mut() {
            assign_interface_names(&mut c.mixin);
        }
        if let Some(c) = self.callback_interfaces.as_mut() {
            assign_interface_names(&mut c.interface);
        }
        if let Some(c) = self.dictionaries.as_mut() {
            for (key, dictionary) in &mut c.dictionary {
                fill(&mut dictionary.name, key);
                dictionary.assign_member_names();
            }
        }
        if let Some(c) = self.enums.as_mut() {
            for (key, entry) in &mut c.entries {
                fill(&mut entry.name, key);
            }
        }
        if let Some(c) = self.callback_functions.as_mut() {
            for (key, entry) in &mut c.callback_function {
                fill(&mut entry.name, key);
            }
        }
        if let Some(namespaces) = self.namespaces.as_mut() {
            for namespace in namespaces {
                namespace.assign_member_names();
            }
        }
    }
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.as_ref()?.method.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.as_ref()?.property.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.as_ref()?.constant.get(name)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated.unwrap_or(false)
    }

    pub(crate) fn assign_member_names(&mut self) {
        if let Some(c) = self.constants.as_mut() {
            for (key, constant) in &mut c.constant {
                fill(&mut constant.name, key);
            }
        }
        if let Some(c) = self.methods.as_mut() {
            for (key, method) in &mut c.method {
                fill(&mut method.name, key);
            }
        }
        if let Some(c) = self.properties.as_mut() {
            for (key, property) in &mut c.property {
                fill(&mut property.name, key);
            }
        }
    }
}

impl Dictionary {
    pub(crate) fn assign_member_names(&mut self) {
        if let Some(members) = self.members.as_mut() {
            for (key, member) in &mut members.member {
                fill(&mut member.name, key);
            }
        }
    }
}

fn assign_interface_names(entries: &mut BTreeMap<String, Interface>) {
    for (key, entry) in entries {
        fill(&mut entry.name, key);
        entry.assign_member_names();
    }
}

fn fill(name: &mut String, key: &str) {
    if name.is_empty() {
        *name = key.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exposure_reads_string_and_list() {
        let from_text: Exposure = serde_json::from_value(json!("Window  Worker")).unwrap();
        let from_list: Exposure = serde_json::from_value(json!(["Window", "Worker", "Window"])).unwrap();

        assert_eq!(from_text, from_list);
        assert_eq!(from_text.contexts(), ["Window", "Worker"]);
        assert_eq!(serde_json::to_value(&from_list).unwrap(), json!("Window Worker"));
    }

    #[test]
    fn test_template_entries_get_names_from_keys() {
        let graph = WebIdl::from_value(json!({
            "interfaces": {
                "interface": {
                    "Foo": {
                        "comment": "doc",
                        "methods": { "method": { "bar": { "comment": "bar doc" } } }
                    }
                }
            }
        }))
        .unwrap();

        let foo = graph.interface("Foo").unwrap();
        assert_eq!(foo.name, "Foo");
        assert_eq!(foo.method("bar").unwrap().name, "bar");
    }

    #[test]
    fn test_flags_accept_numbers() {
        let property: Property = serde_json::from_value(json!({
            "name": "length",
            "type": "unsigned long",
            "read-only": 1,
            "deprecated": true
        }))
        .unwrap();

        assert_eq!(property.read_only, Some(true));
        assert_eq!(property.deprecated, Some(true));
        assert_eq!(property.ty, Typed::named("unsigned long"));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "name": "Foo",
            "global": "Window",
            "secure-context": 1,
            "properties": { "property": { "x": { "name": "x", "type": "long", "event-handler": "x" } } }
        });
        let interface: Interface = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(interface.extra.get("global"), Some(&json!("Window")));
        assert_eq!(
            interface.property("x").unwrap().extra.get("event-handler"),
            Some(&json!("x"))
        );
        assert_eq!(serde_json::to_value(&interface).unwrap(), raw);
    }

    #[test]
    fn test_referenced_names_walk_unions_and_subtypes() {
        let typed: Typed = serde_json::from_value(json!({
            "type": [
                { "type": "sequence", "subtype": { "type": "Node" } },
                { "type": "DOMString" }
            ]
        }))
        .unwrap();

        assert_eq!(typed.referenced_names(), vec!["sequence", "Node", "DOMString"]);
    }
}
