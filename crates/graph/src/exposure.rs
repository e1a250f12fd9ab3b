use crate::error::{GraphError, Result};
use crate::types::{Exposure, Interface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureMode {
    /// Fill only nodes that carry no exposure of their own
    Inherit,
    /// Replace every node's exposure unconditionally
    Force,
}

/// Apply `exposure` to an interface and every member and constructor it holds
pub fn resolve_exposure(entry: &mut Interface, exposure: &Exposure, mode: ExposureMode) -> Result<()> {
    if exposure.is_empty() {
        return Err(GraphError::EmptyExposure(entry.name.clone()));
    }

    assign(&mut entry.exposed, exposure, mode);
    if let Some(constants) = entry.constants.as_mut() {
        for constant in constants.constant.values_mut() {
            assign(&mut constant.exposed, exposure, mode);
        }
    }
    if let Some(methods) = entry.methods.as_mut() {
        for method in methods.method.values_mut() {
            assign(&mut method.exposed, exposure, mode);
        }
    }
    if let Some(properties) = entry.properties.as_mut() {
        for property in properties.property.values_mut() {
            assign(&mut property.exposed, exposure, mode);
        }
    }
    if let Some(constructor) = entry.constructor.as_mut() {
        assign(&mut constructor.exposed, exposure, mode);
    }
    Ok(())
}

/// Exposure a member is visible under: its own, else its parent's
pub fn effective_exposure<'a>(
    member: Option<&'a Exposure>,
    parent: Option<&'a Exposure>,
) -> Option<&'a Exposure> {
    member.filter(|e| !e.is_empty()).or(parent.filter(|e| !e.is_empty()))
}

fn assign(slot: &mut Option<Exposure>, exposure: &Exposure, mode: ExposureMode) {
    let unset = slot.as_ref().map_or(true, Exposure::is_empty);
    if mode == ExposureMode::Force || unset {
        *slot = Some(exposure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn interface() -> Interface {
        serde_json::from_value(json!({
            "name": "Foo",
            "methods": { "method": {
                "tagged": { "exposed": "Worker" },
                "plain": {}
            } },
            "properties": { "property": { "p": { "type": "long" } } }
        }))
        .unwrap()
    }

    #[test]
    fn test_inherit_keeps_existing_tags() {
        let mut foo = interface();
        resolve_exposure(&mut foo, &Exposure::new(["Window"]), ExposureMode::Inherit).unwrap();

        let window = Exposure::new(["Window"]);
        assert_eq!(foo.exposed.as_ref(), Some(&window));
        assert_eq!(foo.method("plain").unwrap().exposed.as_ref(), Some(&window));
        assert_eq!(
            foo.method("tagged").unwrap().exposed,
            Some(Exposure::new(["Worker"]))
        );
        assert_eq!(foo.property("p").unwrap().exposed.as_ref(), Some(&window));
    }

    #[test]
    fn test_force_replaces_everything() {
        let mut foo = interface();
        foo.exposed = Some(Exposure::new(["Window"]));
        resolve_exposure(&mut foo, &Exposure::new(["Worker"]), ExposureMode::Force).unwrap();

        let worker = Some(Exposure::new(["Worker"]));
        assert_eq!(foo.exposed, worker);
        assert_eq!(foo.method("plain").unwrap().exposed, worker);
        assert_eq!(foo.method("tagged").unwrap().exposed, worker);
    }

    #[test]
    fn test_empty_exposure_is_rejected() {
        let mut foo = interface();
        let err = resolve_exposure(&mut foo, &Exposure::default(), ExposureMode::Force).unwrap_err();
        assert!(matches!(err, GraphError::EmptyExposure(ref name) if name == "Foo"));
    }

    #[test]
    fn test_effective_exposure_falls_back_to_parent() {
        let parent = Exposure::new(["Window"]);
        let own = Exposure::new(["Worker"]);
        let empty = Exposure::default();

        assert_eq!(effective_exposure(Some(&own), Some(&parent)), Some(&own));
        assert_eq!(effective_exposure(Some(&empty), Some(&parent)), Some(&parent));
        assert_eq!(effective_exposure(None, None), None);
    }
}
