use crate::error::{EmitError, Result};
use domgen_graph::{
    CallbackFunction, Dictionary, Enum, Interface, IteratorDecl, Method, Param, Property,
    Signature, TypeDef, TypeName, Typed, WebIdl,
};

const INDENT: &str = "    ";

/// Which declaration file to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Full document context
    Web,
    Worker,
    /// Iterator protocol additions for every iterable interface
    Iterators,
}

impl Flavor {
    fn banner(self) -> &'static str {
        match self {
            Self::Web => "Window APIs",
            Self::Worker => "Worker APIs",
            Self::Iterators => "Window Iterable APIs",
        }
    }
}

/// Render `graph` as TypeScript declarations
pub fn emit(graph: &WebIdl, flavor: Flavor) -> Result<String> {
    let mut out = String::new();
    out.push_str("/////////////////////////////\n");
    out.push_str(&format!("/// {}\n", flavor.banner()));
    out.push_str("/////////////////////////////\n\n");

    match flavor {
        Flavor::Web | Flavor::Worker => emit_declarations(graph, &mut out)?,
        Flavor::Iterators => emit_iterators(graph, &mut out)?,
    }
    Ok(out)
}

fn emit_declarations(graph: &WebIdl, out: &mut String) -> Result<()> {
    for dictionary in graph.dictionaries() {
        emit_dictionary(dictionary, out)?;
    }
    for entry in graph.mixins() {
        emit_interface(entry, "mixin", out)?;
    }
    for entry in graph.interfaces() {
        emit_interface(entry, "interface", out)?;
        emit_interface_object(entry, out);
    }
    for entry in graph.callback_interfaces.iter().flat_map(|c| c.interface.values()) {
        emit_interface(entry, "callback interface", out)?;
    }
    for entry in graph.callback_functions.iter().flat_map(|c| c.callback_function.values()) {
        emit_callback(entry, out)?;
    }
    for entry in graph.namespaces.iter().flatten() {
        emit_namespace(entry, out)?;
    }
    for entry in graph.typedefs.iter().flat_map(|t| &t.typedef) {
        emit_typedef(entry, out)?;
    }
    for entry in graph.enums.iter().flat_map(|e| e.entries.values()) {
        emit_enum(entry, out)?;
    }
    Ok(())
}

fn named<'a>(kind: &'static str, name: &'a str) -> Result<&'a str> {
    if name.is_empty() {
        Err(EmitError::UnnamedEntry { kind })
    } else {
        Ok(name)
    }
}

fn emit_doc(comment: Option<&str>, deprecated: bool, indent: &str, out: &mut String) {
    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        for line in comment.lines() {
            out.push_str(&format!("{indent}/** {} */\n", line.trim()));
        }
    }
    if deprecated {
        out.push_str(&format!("{indent}/** @deprecated */\n"));
    }
}

fn emit_interface(entry: &Interface, kind: &'static str, out: &mut String) -> Result<()> {
    let name = named(kind, &entry.name)?;
    emit_doc(entry.comment.as_deref(), entry.is_deprecated(), "", out);

    let parents: Vec<&str> = entry
        .extends
        .iter()
        .map(String::as_str)
        .filter(|parent| *parent != "Object")
        .chain(entry.implements.iter().flatten().map(String::as_str))
        .collect();
    out.push_str(&format!("interface {name}"));
    if !parents.is_empty() {
        out.push_str(&format!(" extends {}", parents.join(", ")));
    }
    out.push_str(" {\n");

    for constant in entry.constants.iter().flat_map(|c| c.constant.values()) {
        emit_doc(constant.comment.as_deref(), false, INDENT, out);
        out.push_str(&format!("{INDENT}readonly {}: {};\n", constant.name, ts_type(&constant.ty)));
    }
    for property in entry.properties.iter().flat_map(|p| p.property.values()) {
        if !is_static(property.is_static) {
            emit_property(property, out);
        }
    }
    for method in entry.methods.iter().flat_map(|m| m.method.values()) {
        if !is_static(method.is_static) {
            emit_method(method, out);
        }
    }
    out.push_str("}\n\n");
    Ok(())
}

/// `declare var` holding the prototype, constructors, constants and statics
fn emit_interface_object(entry: &Interface, out: &mut String) {
    let name = &entry.name;
    out.push_str(&format!("declare var {name}: {{\n"));
    out.push_str(&format!("{INDENT}prototype: {name};\n"));
    for signature in entry.constructor.iter().flat_map(|c| &c.signature) {
        out.push_str(&format!("{INDENT}new({}): {name};\n", params(&signature.param)));
    }
    for constant in entry.constants.iter().flat_map(|c| c.constant.values()) {
        out.push_str(&format!("{INDENT}readonly {}: {};\n", constant.name, ts_type(&constant.ty)));
    }
    for property in entry.properties.iter().flat_map(|p| p.property.values()) {
        if is_static(property.is_static) {
            emit_property(property, out);
        }
    }
    for method in entry.methods.iter().flat_map(|m| m.method.values()) {
        if is_static(method.is_static) {
            emit_method(method, out);
        }
    }
    out.push_str("};\n\n");
}

fn is_static(flag: Option<bool>) -> bool {
    flag.unwrap_or(false)
}

fn emit_property(property: &Property, out: &mut String) {
    emit_doc(property.comment.as_deref(), property.deprecated.unwrap_or(false), INDENT, out);
    let readonly = if property.read_only.unwrap_or(false) {
        "readonly "
    } else {
        ""
    };
    out.push_str(&format!(
        "{INDENT}{readonly}{}: {};\n",
        property.name,
        ts_type(&property.ty)
    ));
}

fn emit_method(method: &Method, out: &mut String) {
    emit_doc(method.comment.as_deref(), method.deprecated.unwrap_or(false), INDENT, out);
    if method.signature.is_empty() {
        out.push_str(&format!("{INDENT}{}(): void;\n", method.name));
        return;
    }
    for signature in &method.signature {
        out.push_str(&format!("{INDENT}{}{};\n", method.name, call_signature(signature)));
    }
}

fn call_signature(signature: &Signature) -> String {
    format!("({}): {}", params(&signature.param), ts_type(&signature.ty))
}

fn params(list: &[Param]) -> String {
    list.iter()
        .map(|param| {
            if param.variadic.unwrap_or(false) {
                format!("...{}: {}", param.name, array_of(&ts_type(&param.ty)))
            } else if param.optional.unwrap_or(false) {
                format!("{}?: {}", param.name, ts_type(&param.ty))
            } else {
                format!("{}: {}", param.name, ts_type(&param.ty))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit_dictionary(entry: &Dictionary, out: &mut String) -> Result<()> {
    let name = named("dictionary", &entry.name)?;
    emit_doc(entry.comment.as_deref(), false, "", out);
    out.push_str(&format!("interface {name}"));
    if let Some(parent) = &entry.extends {
        out.push_str(&format!(" extends {parent}"));
    }
    out.push_str(" {\n");
    for member in entry.members.iter().flat_map(|m| m.member.values()) {
        let optional = if member.required.unwrap_or(false) { "" } else { "?" };
        out.push_str(&format!("{INDENT}{}{optional}: {};\n", member.name, ts_type(&member.ty)));
    }
    out.push_str("}\n\n");
    Ok(())
}

fn emit_callback(entry: &CallbackFunction, out: &mut String) -> Result<()> {
    let name = named("callback function", &entry.name)?;
    emit_doc(entry.comment.as_deref(), false, "", out);
    out.push_str(&format!("interface {name} {{\n"));
    for signature in &entry.signature {
        out.push_str(&format!("{INDENT}{};\n", call_signature(signature)));
    }
    out.push_str("}\n\n");
    Ok(())
}

fn emit_namespace(entry: &Interface, out: &mut String) -> Result<()> {
    let name = named("namespace", &entry.name)?;
    emit_doc(entry.comment.as_deref(), entry.is_deprecated(), "", out);
    out.push_str(&format!("declare namespace {name} {{\n"));
    for property in entry.properties.iter().flat_map(|p| p.property.values()) {
        let binding = if property.read_only.unwrap_or(false) { "const" } else { "var" };
        out.push_str(&format!("{INDENT}{binding} {}: {};\n", property.name, ts_type(&property.ty)));
    }
    for method in entry.methods.iter().flat_map(|m| m.method.values()) {
        for signature in &method.signature {
            out.push_str(&format!("{INDENT}function {}{};\n", method.name, call_signature(signature)));
        }
    }
    out.push_str("}\n\n");
    Ok(())
}

fn emit_typedef(entry: &TypeDef, out: &mut String) -> Result<()> {
    let name = named("typedef", &entry.new_type)?;
    out.push_str(&format!("type {name} = {};\n", ts_type(&entry.ty)));
    Ok(())
}

fn emit_enum(entry: &Enum, out: &mut String) -> Result<()> {
    let name = named("enum", &entry.name)?;
    let values: Vec<String> = entry.value.iter().map(|v| format!("\"{v}\"")).collect();
    let body = if values.is_empty() {
        "never".to_string()
    } else {
        values.join(" | ")
    };
    out.push_str(&format!("type {name} = {body};\n"));
    Ok(())
}

fn emit_iterators(graph: &WebIdl, out: &mut String) -> Result<()> {
    for entry in graph.interfaces().chain(graph.mixins()) {
        let Some(iterator) = &entry.iterator else {
            continue;
        };
        let name = named("interface", &entry.name)?;
        let Some((key, value)) = iterator_types(iterator) else {
            log::debug!("Skipping {name}: iterator declares no types");
            continue;
        };
        let item = if iterator.ty.len() == 1 && iterator.kind != "maplike" {
            value.clone()
        } else {
            format!("[{key}, {value}]")
        };

        out.push_str(&format!("interface {name} {{\n"));
        out.push_str(&format!("{INDENT}[Symbol.iterator](): IterableIterator<{item}>;\n"));
        out.push_str(&format!("{INDENT}entries(): IterableIterator<[{key}, {value}]>;\n"));
        out.push_str(&format!("{INDENT}keys(): IterableIterator<{key}>;\n"));
        out.push_str(&format!("{INDENT}values(): IterableIterator<{value}>;\n"));
        out.push_str("}\n\n");
    }
    Ok(())
}

/// Key and value types; value iterators are keyed by index, sets by value
fn iterator_types(iterator: &IteratorDecl) -> Option<(String, String)> {
    match iterator.ty.as_slice() {
        [] => None,
        [value] => {
            let value = ts_type(value);
            let key = if iterator.kind == "setlike" {
                value.clone()
            } else {
                "number".to_string()
            };
            Some((key, value))
        }
        [key, value, ..] => Some((ts_type(key), ts_type(value))),
    }
}

/// TypeScript spelling of an IDL type
pub fn ts_type(typed: &Typed) -> String {
    let base = match &typed.ty {
        Some(TypeName::Union(members)) => members
            .iter()
            .map(ts_type)
            .collect::<Vec<_>>()
            .join(" | "),
        Some(TypeName::Named(name)) => generic(name, &typed.subtypes()),
        None => "any".to_string(),
    };
    if typed.nullable.unwrap_or(false) {
        format!("{base} | null")
    } else {
        base
    }
}

fn generic(name: &str, args: &[&Typed]) -> String {
    let arg = |i: usize| args.get(i).map_or_else(|| "any".to_string(), |t| ts_type(t));
    match name {
        "sequence" => array_of(&arg(0)),
        "FrozenArray" | "ObservableArray" => format!("ReadonlyArray<{}>", arg(0)),
        "Promise" => format!("Promise<{}>", arg(0)),
        "record" => format!("Record<{}, {}>", arg(0), arg(1)),
        other => primitive(other).unwrap_or(other).to_string(),
    }
}

fn array_of(item: &str) -> String {
    if item.contains(' ') {
        format!("({item})[]")
    } else {
        format!("{item}[]")
    }
}

fn primitive(name: &str) -> Option<&'static str> {
    let mapped = match name {
        "DOMString" | "USVString" | "ByteString" | "CSSOMString" => "string",
        "boolean" => "boolean",
        "byte" | "octet" | "short" | "unsigned short" | "long" | "unsigned long"
        | "long long" | "unsigned long long" | "float" | "unrestricted float" | "double"
        | "unrestricted double" => "number",
        "bigint" => "bigint",
        "any" => "any",
        "object" => "any",
        "undefined" | "void" => "void",
        _ => return None,
    };
    Some(mapped)
}
