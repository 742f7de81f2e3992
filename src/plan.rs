//! Terraformer plan "cooking": replace generated resource names with the
//! value of each resource's `Name` tag.
//!
//! The plan is handled as a `serde_json::Value` so that every field we do not
//! touch survives the round trip unchanged, in its original key order.

use crate::error::{PlanError, PlanResult};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const IMPORTED_RESOURCE_KEY: &str = "ImportedResource";
pub const COOKED_PLAN_FILE_NAME: &str = "cooked_plan.json";
pub const NAME_TAG: &str = "Name";

/// Placeholder used when reporting a record that has neither a name tag nor a
/// `ResourceName`.
const UNNAMED: &str = "<unnamed>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub resource_type: String,
    pub index: usize,
    pub from: String,
    pub to: String,
}

pub fn load_plan(path: &Path) -> PlanResult<Value> {
    if !path.exists() {
        return Err(PlanError::NotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(PlanError::Parse)
}

fn name_tag(record: &Value) -> Option<&str> {
    record
        .get("Item")
        .and_then(|item| item.get("tags"))
        .and_then(|tags| tags.get(NAME_TAG))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

fn resource_name(record: &Value) -> Option<&str> {
    record.get("ResourceName").and_then(Value::as_str)
}

/// Fails with `MissingNameTags` listing every record without a usable `Name`
/// tag; nothing is mutated at this point.
pub fn plan_renames(doc: &Value) -> PlanResult<Vec<Rename>> {
    let groups = doc
        .get(IMPORTED_RESOURCE_KEY)
        .ok_or(PlanError::MissingImportedResource)?
        .as_object()
        .ok_or_else(|| PlanError::invalid_shape("'ImportedResource' is not an object"))?;

    let mut renames = Vec::new();
    let mut missing = Vec::new();

    for (resource_type, records) in groups {
        let records = records.as_array().ok_or_else(|| {
            PlanError::invalid_shape(format!("resources of type '{resource_type}' are not a list"))
        })?;

        for (index, record) in records.iter().enumerate() {
            let from = resource_name(record).unwrap_or(UNNAMED);
            match name_tag(record) {
                Some(to) => {
                    info!("Renaming {} to {}", from, to);
                    renames.push(Rename {
                        resource_type: resource_type.clone(),
                        index,
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                None => {
                    warn!("Unable to find 'Name' tag on {}", from);
                    missing.push(from.to_string());
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(renames)
    } else {
        Err(PlanError::MissingNameTags(missing))
    }
}

pub fn apply_renames(doc: &mut Value, renames: &[Rename]) -> PlanResult<()> {
    for rename in renames {
        let record = doc
            .get_mut(IMPORTED_RESOURCE_KEY)
            .and_then(|groups| groups.get_mut(&rename.resource_type))
            .and_then(|records| records.get_mut(rename.index))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                PlanError::invalid_shape(format!(
                    "resource {}[{}] is not an object",
                    rename.resource_type, rename.index
                ))
            })?;
        record.insert("ResourceName".to_string(), Value::String(rename.to.clone()));
    }
    Ok(())
}

/// `cooked_plan.json` next to the input plan.
pub fn cooked_plan_path(input: &Path) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(COOKED_PLAN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(COOKED_PLAN_FILE_NAME))
}

pub fn to_pretty_json(doc: &Value) -> PlanResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser).map_err(PlanError::Serialize)?;
    Ok(buf)
}

pub fn write_plan(doc: &Value, path: &Path) -> PlanResult<()> {
    let bytes = to_pretty_json(doc)?;
    fs::write(path, bytes).map_err(|source| PlanError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn cook_plan(input: &Path) -> PlanResult<PathBuf> {
    let mut doc = load_plan(input)?;
    let renames = plan_renames(&doc)?;
    apply_renames(&mut doc, &renames)?;

    let output = cooked_plan_path(input);
    write_plan(&doc, &output)?;
    Ok(output)
}
