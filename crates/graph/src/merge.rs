//! Deep merge of graphs and graph fragments.
//!
//! Every model type declares how each of its fields merges (scalar, named map,
//! identified array, list, nested record, opaque JSON), so conflict handling is
//! decided by field kind and the active [`Policy`] rather than by inspecting
//! values at runtime.

use crate::error::{GraphError, Result};
use crate::types::*;
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// What happens when both sides define the same node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// A key present on both sides is a conflict
    Reject,
    /// Shared keys merge recursively; changing an existing scalar is a conflict
    Extend,
    /// Shared keys merge recursively; the addition's scalars win
    Override,
}

/// Conflict policy per graph level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// Top-level collection entries (interfaces, mixins, dictionaries, ...) and their own fields
    pub entries: Policy,
    /// Member maps (constants, methods, properties, dictionary members) and everything below
    pub members: Policy,
}

impl MergePolicy {
    pub const STRICT: Self = Self {
        entries: Policy::Reject,
        members: Policy::Reject,
    };

    /// Standard fragments: entries may gain members but not be redefined
    pub const STANDARD: Self = Self {
        entries: Policy::Extend,
        members: Policy::Override,
    };

    /// Additions: new nodes anywhere, but nothing that already exists
    pub const ADDITIVE: Self = Self {
        entries: Policy::Extend,
        members: Policy::Reject,
    };

    pub const OVERRIDE: Self = Self {
        entries: Policy::Override,
        members: Policy::Override,
    };
}

/// Merge `addition` into `base` and return the result
pub fn merge<T: Merge>(mut base: T, addition: T, policy: MergePolicy) -> Result<T> {
    let mut cx = MergeCx::new(policy);
    base.merge_from(addition, &mut cx)?;
    Ok(base)
}

/// Fold a partial interface's constants, methods, and properties into its base
pub fn merge_members(base: &mut Interface, partial: Interface, policy: MergePolicy) -> Result<()> {
    let mut cx = MergeCx::new(policy);
    cx.path.push(base.name.clone());
    record(&mut cx, "constants", policy.members, &mut base.constants, partial.constants)?;
    record(&mut cx, "methods", policy.members, &mut base.methods, partial.methods)?;
    record(&mut cx, "properties", policy.members, &mut base.properties, partial.properties)?;
    Ok(())
}

/// Fold a partial dictionary's members into its base
pub fn merge_dictionary_members(
    base: &mut Dictionary,
    partial: Dictionary,
    policy: MergePolicy,
) -> Result<()> {
    let mut cx = MergeCx::new(policy);
    cx.path.push(base.name.clone());
    record(&mut cx, "members", policy.members, &mut base.members, partial.members)
}

pub trait Merge: Sized {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()>;
}

/// Identity of an item inside an identified array
pub trait Identified {
    fn identity(&self) -> &str;
}

/// Active policy plus the dotted path used in conflict errors
pub struct MergeCx {
    policy: MergePolicy,
    active: Policy,
    path: Vec<String>,
}

impl MergeCx {
    fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            active: policy.entries,
            path: Vec::new(),
        }
    }

    fn scoped<R>(
        &mut self,
        segment: &str,
        active: Policy,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.path.push(segment.to_string());
        let saved = std::mem::replace(&mut self.active, active);
        let result = f(self);
        self.active = saved;
        self.path.pop();
        result
    }

    fn conflict(&self, key: &str) -> GraphError {
        let mut path = self.path.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);
        GraphError::conflict(path)
    }
}

fn scalar<T: PartialEq>(cx: &MergeCx, key: &str, base: &mut Option<T>, addition: Option<T>) -> Result<()> {
    let Some(value) = addition else {
        return Ok(());
    };
    match base {
        None => *base = Some(value),
        Some(existing) if *existing == value => {}
        Some(existing) => match cx.active {
            Policy::Override => *existing = value,
            Policy::Reject | Policy::Extend => return Err(cx.conflict(key)),
        },
    }
    Ok(())
}

/// Set-like field that may only grow; any growth of an existing value counts
/// as a change under `Reject` and `Extend`
fn grow<T: Clone + PartialEq>(
    cx: &MergeCx,
    key: &str,
    base: &mut Option<T>,
    addition: Option<T>,
    union: impl FnOnce(&mut T, T),
) -> Result<()> {
    let Some(value) = addition else {
        return Ok(());
    };
    let existing = match base {
        None => {
            *base = Some(value);
            return Ok(());
        }
        Some(existing) => existing,
    };
    let mut merged = existing.clone();
    union(&mut merged, value);
    if merged == *existing {
        return Ok(());
    }
    match cx.active {
        Policy::Override => {
            *existing = merged;
            Ok(())
        }
        Policy::Reject | Policy::Extend => Err(cx.conflict(key)),
    }
}

/// Deprecation is never cleared once set
fn sticky(cx: &MergeCx, base: &mut Option<bool>, addition: Option<bool>) -> Result<()> {
    grow(cx, "deprecated", base, addition, |base, addition| *base = *base || addition)
}

fn record<T: Merge>(
    cx: &mut MergeCx,
    key: &str,
    level: Policy,
    base: &mut Option<T>,
    addition: Option<T>,
) -> Result<()> {
    let Some(value) = addition else {
        return Ok(());
    };
    match base {
        None => {
            *base = Some(value);
            Ok(())
        }
        Some(existing) => cx.scoped(key, level, |cx| existing.merge_from(value, cx)),
    }
}

fn entries<T: Merge>(
    cx: &mut MergeCx,
    key: &str,
    level: Policy,
    base: &mut BTreeMap<String, T>,
    addition: BTreeMap<String, T>,
) -> Result<()> {
    cx.scoped(key, level, |cx| {
        for (name, value) in addition {
            match base.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    if level == Policy::Reject {
                        return Err(cx.conflict(slot.key()));
                    }
                    let name = slot.key().clone();
                    cx.scoped(&name, level, |cx| slot.get_mut().merge_from(value, cx))?;
                }
            }
        }
        Ok(())
    })
}

fn identified<T: Merge + Identified>(
    cx: &mut MergeCx,
    key: &str,
    level: Policy,
    base: &mut Vec<T>,
    addition: Vec<T>,
) -> Result<()> {
    cx.scoped(key, level, |cx| {
        for item in addition {
            let position = base
                .iter()
                .position(|existing| !item.identity().is_empty() && existing.identity() == item.identity());
            match position {
                None => base.push(item),
                Some(_) if level == Policy::Reject => return Err(cx.conflict(item.identity())),
                Some(index) => {
                    let name = item.identity().to_string();
                    cx.scoped(&name, level, |cx| base[index].merge_from(item, cx))?;
                }
            }
        }
        Ok(())
    })
}

/// String sets (exposure, implements, enum values) concatenate without repeats
fn names(base: &mut Vec<String>, addition: Vec<String>) {
    for name in addition {
        if !base.contains(&name) {
            base.push(name);
        }
    }
}

fn exposure(cx: &MergeCx, key: &str, base: &mut Option<Exposure>, addition: Option<Exposure>) -> Result<()> {
    let Some(addition) = addition.filter(|e| !e.is_empty()) else {
        return Ok(());
    };
    if base.as_ref().is_some_and(Exposure::is_empty) {
        *base = None;
    }
    grow(cx, key, base, Some(addition), Exposure::extend)
}

fn json(cx: &mut MergeCx, key: &str, base: &mut Value, addition: Value) -> Result<()> {
    match (base, addition) {
        (Value::Object(base), Value::Object(addition)) => {
            let active = cx.active;
            cx.scoped(key, active, |cx| object(cx, base, addition))
        }
        (Value::Array(base), Value::Array(addition)) => {
            base.extend(addition);
            Ok(())
        }
        (base, addition) if *base == addition => Ok(()),
        (base, addition) => match cx.active {
            Policy::Override => {
                *base = addition;
                Ok(())
            }
            Policy::Reject | Policy::Extend => Err(cx.conflict(key)),
        },
    }
}

fn object(cx: &mut MergeCx, base: &mut Map<String, Value>, addition: Map<String, Value>) -> Result<()> {
    for (key, value) in addition {
        match base.get_mut(&key) {
            None => {
                base.insert(key, value);
            }
            Some(existing) => json(cx, &key, existing, value)?,
        }
    }
    Ok(())
}

impl Merge for WebIdl {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        record(cx, "callback-functions", level, &mut self.callback_functions, addition.callback_functions)?;
        record(cx, "callback-interfaces", level, &mut self.callback_interfaces, addition.callback_interfaces)?;
        record(cx, "dictionaries", level, &mut self.dictionaries, addition.dictionaries)?;
        record(cx, "enums", level, &mut self.enums, addition.enums)?;
        record(cx, "interfaces", level, &mut self.interfaces, addition.interfaces)?;
        record(cx, "mixins", level, &mut self.mixins, addition.mixins)?;
        record(cx, "typedefs", level, &mut self.typedefs, addition.typedefs)?;
        if let Some(namespaces) = addition.namespaces {
            let base = self.namespaces.get_or_insert_with(Vec::new);
            identified(cx, "namespaces", level, base, namespaces)?;
        }
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Interfaces {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "interface", level, &mut self.interface, addition.interface)
    }
}

impl Merge for CallbackInterfaces {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "interface", level, &mut self.interface, addition.interface)
    }
}

impl Merge for Mixins {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "mixin", level, &mut self.mixin, addition.mixin)
    }
}

impl Merge for Dictionaries {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "dictionary", level, &mut self.dictionary, addition.dictionary)
    }
}

impl Merge for Enums {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "enum", level, &mut self.entries, addition.entries)
    }
}

impl Merge for CallbackFunctions {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        entries(cx, "callback-function", level, &mut self.callback_function, addition.callback_function)
    }
}

impl Merge for TypeDefs {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.entries;
        identified(cx, "typedef", level, &mut self.typedef, addition.typedef)
    }
}

impl Merge for Interface {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let members = cx.policy.members;
        scalar(cx, "extends", &mut self.extends, addition.extends)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        record(cx, "constants", members, &mut self.constants, addition.constants)?;
        record(cx, "methods", members, &mut self.methods, addition.methods)?;
        record(cx, "properties", members, &mut self.properties, addition.properties)?;
        record(cx, "constructor", members, &mut self.constructor, addition.constructor)?;
        record(cx, "iterator", members, &mut self.iterator, addition.iterator)?;
        exposure(cx, "exposed", &mut self.exposed, addition.exposed)?;
        exposure(cx, "override-exposed", &mut self.override_exposed, addition.override_exposed)?;
        grow(cx, "implements", &mut self.implements, addition.implements, names)?;
        sticky(cx, &mut self.deprecated, addition.deprecated)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Identified for Interface {
    fn identity(&self) -> &str {
        &self.name
    }
}

impl Merge for Constants {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.members;
        entries(cx, "constant", level, &mut self.constant, addition.constant)
    }
}

impl Merge for Methods {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.members;
        entries(cx, "method", level, &mut self.method, addition.method)
    }
}

impl Merge for Properties {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.members;
        entries(cx, "property", level, &mut self.property, addition.property)
    }
}

impl Merge for Members {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let level = cx.policy.members;
        entries(cx, "member", level, &mut self.member, addition.member)
    }
}

impl Merge for Typed {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        scalar(cx, "type", &mut self.ty, addition.ty)?;
        scalar(cx, "subtype", &mut self.subtype, addition.subtype)?;
        scalar(cx, "nullable", &mut self.nullable, addition.nullable)
    }
}

impl Merge for Constant {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.ty.merge_from(addition.ty, cx)?;
        scalar(cx, "value", &mut self.value, addition.value)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        exposure(cx, "exposed", &mut self.exposed, addition.exposed)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Method {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.signature.extend(addition.signature);
        scalar(cx, "static", &mut self.is_static, addition.is_static)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        exposure(cx, "exposed", &mut self.exposed, addition.exposed)?;
        sticky(cx, &mut self.deprecated, addition.deprecated)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Property {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.ty.merge_from(addition.ty, cx)?;
        scalar(cx, "read-only", &mut self.read_only, addition.read_only)?;
        scalar(cx, "static", &mut self.is_static, addition.is_static)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        exposure(cx, "exposed", &mut self.exposed, addition.exposed)?;
        sticky(cx, &mut self.deprecated, addition.deprecated)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Constructor {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.signature.extend(addition.signature);
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        exposure(cx, "exposed", &mut self.exposed, addition.exposed)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for IteratorDecl {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        if self.kind.is_empty() {
            self.kind = addition.kind;
        } else if !addition.kind.is_empty() && self.kind != addition.kind {
            match cx.active {
                Policy::Override => self.kind = addition.kind,
                Policy::Reject | Policy::Extend => return Err(cx.conflict("kind")),
            }
        }
        self.ty.extend(addition.ty);
        scalar(cx, "readonly", &mut self.readonly, addition.readonly)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Dictionary {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        let members = cx.policy.members;
        scalar(cx, "extends", &mut self.extends, addition.extends)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        record(cx, "members", members, &mut self.members, addition.members)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Member {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.ty.merge_from(addition.ty, cx)?;
        scalar(cx, "required", &mut self.required, addition.required)?;
        scalar(cx, "default", &mut self.default, addition.default)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for Enum {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        names(&mut self.value, addition.value);
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for CallbackFunction {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.signature.extend(addition.signature);
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Merge for TypeDef {
    fn merge_from(&mut self, addition: Self, cx: &mut MergeCx) -> Result<()> {
        self.ty.merge_from(addition.ty, cx)?;
        scalar(cx, "comment", &mut self.comment, addition.comment)?;
        object(cx, &mut self.extra, addition.extra)
    }
}

impl Identified for TypeDef {
    fn identity(&self) -> &str {
        &self.new_type
    }
}
