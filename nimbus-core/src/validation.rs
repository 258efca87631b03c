/// Name checks for datasets, kinds, key names and property names
///
/// The service rejects these on its own, but catching them locally turns a
/// round trip into an immediate validation error.

use crate::{Error, Identifier, Key, Result};

/// Maximum length in bytes of a kind, key name or property name
pub const MAX_NAME_BYTES: usize = 500;

fn is_reserved(name: &str) -> bool {
    name.len() >= 4 && name.starts_with("__") && name.ends_with("__")
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", what)));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(Error::Validation(format!(
            "{} '{}' exceeds {} bytes",
            what, name, MAX_NAME_BYTES
        )));
    }
    if is_reserved(name) {
        return Err(Error::Validation(format!(
            "{} '{}' uses the reserved __name__ form",
            what, name
        )));
    }
    Ok(())
}

pub fn validate_dataset_id(dataset_id: &str) -> Result<()> {
    if dataset_id.trim().is_empty() {
        return Err(Error::Validation("dataset id must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_kind(kind: &str) -> Result<()> {
    check_name("kind", kind)
}

pub fn validate_property_name(name: &str) -> Result<()> {
    check_name("property name", name)
}

/// Kinds and string names of every path element.
pub fn validate_key_names(key: &Key) -> Result<()> {
    for element in &key.path {
        validate_kind(&element.kind)?;
        if let Some(Identifier::Name(name)) = &element.identifier {
            check_name("key name", name)?;
        }
    }
    Ok(())
}
