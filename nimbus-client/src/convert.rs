/// Conversions between local keys/entities and their wire protos
///
/// Pure functions with no I/O. The dataset id is only needed where a key is
/// addressed to the service (`key_to_key_proto`); key values embedded in
/// entities are encoded without a partition.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use nimbus_core::validation::{validate_dataset_id, validate_key_names, validate_property_name};
use nimbus_core::{Entity, Error, Identifier, Key, PathElement, Result, Value};
use nimbus_proto as proto;

// ============================================================================
// Key Conversions
// ============================================================================

/// True iff no path element's identifier is absent
pub fn is_key_complete(key: &Key) -> bool {
    key.is_complete()
}

fn key_path_to_proto(key: &Key) -> Result<Vec<proto::PathElement>> {
    key.validate()?;
    validate_key_names(key)?;

    Ok(key
        .path
        .iter()
        .map(|element| {
            let (id, name) = match &element.identifier {
                Some(Identifier::Id(id)) => (Some(*id), None),
                Some(Identifier::Name(name)) => (None, Some(name.clone())),
                None => (None, None),
            };
            proto::PathElement {
                kind: element.kind.clone(),
                id,
                name,
            }
        })
        .collect())
}

/// Encode a key addressed to `dataset_id`.
///
/// Fails with `Error::Validation` when the dataset id is empty or any element
/// other than the last is incomplete.
pub fn key_to_key_proto(dataset_id: &str, key: &Key) -> Result<proto::Key> {
    validate_dataset_id(dataset_id)?;
    let path = key_path_to_proto(key)?;

    Ok(proto::Key {
        partition_id: Some(proto::PartitionId {
            dataset_id: Some(dataset_id.to_string()),
            namespace: key.namespace.clone(),
        }),
        path,
    })
}

/// Decode a KeyProto. The dataset id is dropped; the namespace is kept.
///
/// An element carrying both `id` and `name` decodes to the id.
pub fn key_from_key_proto(key: proto::Key) -> Result<Key> {
    let namespace = key.partition_id.and_then(|p| p.namespace);
    let path: Vec<PathElement> = key
        .path
        .into_iter()
        .map(|element| {
            let identifier = match (element.id, element.name) {
                (Some(id), _) => Some(Identifier::Id(id)),
                (None, Some(name)) => Some(Identifier::Name(name)),
                (None, None) => None,
            };
            PathElement {
                kind: element.kind,
                identifier,
            }
        })
        .collect();

    let key = Key { namespace, path };
    key.validate()
        .map_err(|e| Error::Decoding(format!("malformed key from server: {}", e)))?;
    Ok(key)
}

// ============================================================================
// Value Conversions
// ============================================================================

/// Encode a single property value
pub fn value_to_proto(value: &Value) -> Result<proto::Value> {
    let mut out = proto::Value::default();

    match value {
        Value::String(s) => out.string_value = Some(s.clone()),
        Value::Integer(i) => out.integer_value = Some(*i),
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(Error::Encoding(format!(
                    "double value {} has no wire representation",
                    d
                )));
            }
            out.double_value = Some(*d);
        }
        Value::Boolean(b) => out.boolean_value = Some(*b),
        Value::Timestamp(ts) => {
            out.date_time_value = Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
        }
        Value::Key(k) => {
            out.key_value = Some(proto::Key {
                partition_id: k.namespace.as_ref().map(|ns| proto::PartitionId {
                    dataset_id: None,
                    namespace: Some(ns.clone()),
                }),
                path: key_path_to_proto(k)?,
            })
        }
        Value::Blob(b) => out.blob_value = Some(STANDARD.encode(b)),
        Value::Entity(e) => out.entity_value = Some(entity_to_entity_proto(e)?),
        Value::List(items) => {
            let encoded = items
                .iter()
                .map(|item| match item {
                    Value::List(_) => Err(Error::Encoding(
                        "lists cannot directly contain lists".to_string(),
                    )),
                    other => value_to_proto(other),
                })
                .collect::<Result<Vec<_>>>()?;
            out.list_value = Some(encoded);
            out.multi = Some(true);
        }
    }

    Ok(out)
}

/// Decode a single property value; None when no known value field is set.
pub fn value_from_proto(value: proto::Value) -> Result<Option<Value>> {
    if let Some(b) = value.boolean_value {
        return Ok(Some(Value::Boolean(b)));
    }
    if let Some(i) = value.integer_value {
        return Ok(Some(Value::Integer(i)));
    }
    if let Some(d) = value.double_value {
        return Ok(Some(Value::Double(d)));
    }
    if let Some(s) = value.string_value {
        return Ok(Some(Value::String(s)));
    }
    if let Some(ts) = value.date_time_value {
        let parsed = DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| Error::Decoding(format!("invalid dateTimeValue '{}': {}", ts, e)))?;
        return Ok(Some(Value::Timestamp(parsed.with_timezone(&Utc))));
    }
    if let Some(k) = value.key_value {
        return Ok(Some(Value::Key(key_from_key_proto(k)?)));
    }
    if let Some(b) = value.blob_value {
        let decoded = STANDARD
            .decode(&b)
            .or_else(|_| URL_SAFE.decode(&b))
            .map_err(|e| Error::Decoding(format!("invalid blobValue: {}", e)))?;
        return Ok(Some(Value::Blob(Bytes::from(decoded))));
    }
    if let Some(e) = value.entity_value {
        return Ok(Some(Value::Entity(entity_from_entity_proto(e)?)));
    }
    if let Some(items) = value.list_value {
        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            if let Some(v) = value_from_proto(item)? {
                decoded.push(v);
            }
        }
        return Ok(Some(Value::List(decoded)));
    }

    Ok(None)
}

// ============================================================================
// Entity Conversions
// ============================================================================

/// Encode an entity's properties, sorted by name. The proto carries no key.
pub fn entity_to_entity_proto(entity: &Entity) -> Result<proto::Entity> {
    let mut names: Vec<&String> = entity.keys().collect();
    names.sort();

    let mut property = Vec::with_capacity(names.len());
    for name in names {
        validate_property_name(name)?;
        let value = value_to_proto(&entity[name])
            .map_err(|e| e.with_context(&format!("property '{}'", name)))?;
        property.push(proto::Property {
            name: name.clone(),
            value,
        });
    }

    Ok(proto::Entity {
        key: None,
        property,
    })
}

/// Encode an entity together with its key, as sent in mutations.
pub fn entity_to_entity_proto_with_key(
    dataset_id: &str,
    key: &Key,
    entity: &Entity,
) -> Result<proto::Entity> {
    let mut encoded = entity_to_entity_proto(entity)?;
    encoded.key = Some(key_to_key_proto(dataset_id, key)?);
    Ok(encoded)
}

/// Decode an entity's properties. Properties without a known value field are
/// left out.
pub fn entity_from_entity_proto(entity: proto::Entity) -> Result<Entity> {
    let mut decoded = Entity::with_capacity(entity.property.len());
    for property in entity.property {
        if let Some(value) = value_from_proto(property.value)? {
            decoded.insert(property.name, value);
        }
    }
    Ok(decoded)
}
