/// Query builder
///
/// A `Query` is scoped to one dataset and a list of (namespace, kind) pairs.
/// It only describes the query; execution is not part of this crate.
use crate::convert::{key_to_key_proto, value_to_proto};
use crate::error::{ClientError, Result};
use lazy_static::lazy_static;
use nimbus_core::{Key, Value};
use nimbus_proto as proto;
use nimbus_proto::{Direction, PropertyOperator};
use regex::Regex;

/// Namespace used when the caller names none
pub const DEFAULT_NAMESPACE: &str = "default";

lazy_static! {
    static ref FILTER_EXPR: Regex =
        Regex::new(r"^\s*([^\s<>=]+)\s*(<=|>=|=|<|>|(?i:has_ancestor))\s*$").unwrap();
}

/// One or more kind names; lets `Dataset::query` take a single kind or a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kinds(pub Vec<String>);

impl From<&str> for Kinds {
    fn from(kind: &str) -> Self {
        Kinds(vec![kind.to_string()])
    }
}

impl From<String> for Kinds {
    fn from(kind: String) -> Self {
        Kinds(vec![kind])
    }
}

impl From<Vec<String>> for Kinds {
    fn from(kinds: Vec<String>) -> Self {
        Kinds(kinds)
    }
}

impl From<Vec<&str>> for Kinds {
    fn from(kinds: Vec<&str>) -> Self {
        Kinds(kinds.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Kinds {
    fn from(kinds: &[&str]) -> Self {
        Kinds(kinds.iter().map(|k| k.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Kinds {
    fn from(kinds: [&str; N]) -> Self {
        Kinds(kinds.iter().map(|k| k.to_string()).collect())
    }
}

/// Namespace-qualified kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedKind {
    pub namespace: String,
    pub kind: String,
}

impl<N: Into<String>, K: Into<String>> From<(N, K)> for NamespacedKind {
    fn from((namespace, kind): (N, K)) -> Self {
        NamespacedKind {
            namespace: namespace.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FilterClause {
    property: String,
    operator: PropertyOperator,
    value: Value,
}

/// Query description
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    dataset_id: String,
    kinds: Vec<NamespacedKind>,
    filters: Vec<FilterClause>,
    orders: Vec<(String, Direction)>,
    projection: Vec<String>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Query {
    /// Create a query over `kinds` in `dataset_id`
    pub fn new(dataset_id: impl Into<String>, kinds: Vec<NamespacedKind>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            kinds,
            filters: Vec::new(),
            orders: Vec::new(),
            projection: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Query over `kinds` in one namespace
    pub fn in_namespace(
        dataset_id: impl Into<String>,
        namespace: impl Into<String>,
        kinds: impl Into<Kinds>,
    ) -> Self {
        let namespace = namespace.into();
        let kinds = kinds
            .into()
            .0
            .into_iter()
            .map(|kind| NamespacedKind {
                namespace: namespace.clone(),
                kind,
            })
            .collect();
        Self::new(dataset_id, kinds)
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn kinds(&self) -> &[NamespacedKind] {
        &self.kinds
    }

    /// Add a filter written as `"<property> <op>"`, e.g. `"age >="`.
    ///
    /// Operators: `=`, `<`, `<=`, `>`, `>=`, `HAS_ANCESTOR`.
    pub fn filter(self, expression: &str, value: impl Into<Value>) -> Result<Self> {
        let captures = FILTER_EXPR.captures(expression).ok_or_else(|| {
            ClientError::Validation(format!("Invalid filter expression '{}'", expression))
        })?;

        let operator = match &captures[2] {
            "=" => PropertyOperator::Equal,
            "<" => PropertyOperator::LessThan,
            "<=" => PropertyOperator::LessThanOrEqual,
            ">" => PropertyOperator::GreaterThan,
            ">=" => PropertyOperator::GreaterThanOrEqual,
            _ => PropertyOperator::HasAncestor,
        };
        let property = captures[1].to_string();
        Ok(self.filter_by(property, operator, value))
    }

    /// Add a filter with an explicit operator
    pub fn filter_by(
        mut self,
        property: impl Into<String>,
        operator: PropertyOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(FilterClause {
            property: property.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Restrict results to descendants of `ancestor`
    pub fn has_ancestor(self, ancestor: Key) -> Self {
        self.filter_by("__key__", PropertyOperator::HasAncestor, Value::Key(ancestor))
    }

    /// Sort by a property; a leading `-` sorts descending, `+` or nothing ascending.
    pub fn order(mut self, property: &str) -> Self {
        let (name, direction) = match property.strip_prefix('-') {
            Some(rest) => (rest, Direction::Descending),
            None => (
                property.strip_prefix('+').unwrap_or(property),
                Direction::Ascending,
            ),
        };
        self.orders.push((name.to_string(), direction));
        self
    }

    /// Only return the listed properties
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.min(i32::MAX as usize) as i32);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset.min(i32::MAX as usize) as i32);
        self
    }

    /// Wire QueryProto. Key values in filters are encoded against this
    /// query's dataset.
    pub fn to_proto(&self) -> Result<proto::Query> {
        let mut property_filters = Vec::with_capacity(self.filters.len());
        for clause in &self.filters {
            let value = match &clause.value {
                Value::Key(key) => proto::Value {
                    key_value: Some(key_to_key_proto(&self.dataset_id, key)?),
                    ..Default::default()
                },
                other => value_to_proto(other)?,
            };
            property_filters.push(proto::Filter {
                property_filter: Some(proto::PropertyFilter {
                    property: proto::PropertyReference {
                        name: clause.property.clone(),
                    },
                    operator: clause.operator,
                    value,
                }),
                ..Default::default()
            });
        }

        let filter = match property_filters.len() {
            0 => None,
            1 => property_filters.pop(),
            _ => Some(proto::Filter {
                composite_filter: Some(proto::CompositeFilter {
                    operator: proto::CompositeOperator::And,
                    filters: property_filters,
                }),
                ..Default::default()
            }),
        };

        Ok(proto::Query {
            projection: self
                .projection
                .iter()
                .map(|name| proto::PropertyExpression {
                    property: proto::PropertyReference { name: name.clone() },
                })
                .collect(),
            kinds: self
                .kinds
                .iter()
                .map(|k| proto::KindExpression {
                    name: k.kind.clone(),
                })
                .collect(),
            filter,
            order: self
                .orders
                .iter()
                .map(|(name, direction)| proto::PropertyOrder {
                    property: proto::PropertyReference { name: name.clone() },
                    direction: *direction,
                })
                .collect(),
            offset: self.offset,
            limit: self.limit,
        })
    }

    /// Full `runQuery` body. A request has one partition, so every kind must
    /// share a namespace; the default namespace is left out of the body.
    pub fn to_request(&self) -> Result<proto::RunQueryRequest> {
        let first = self.kinds.first().map(|k| k.namespace.as_str());
        if let Some(other) = self
            .kinds
            .iter()
            .find(|k| Some(k.namespace.as_str()) != first)
        {
            return Err(ClientError::Validation(format!(
                "query mixes namespaces '{}' and '{}'",
                first.unwrap_or_default(),
                other.namespace
            )));
        }
        let namespace = first
            .filter(|ns| *ns != DEFAULT_NAMESPACE)
            .map(str::to_string);

        Ok(proto::RunQueryRequest {
            read_options: None,
            partition_id: Some(proto::PartitionId {
                dataset_id: Some(self.dataset_id.clone()),
                namespace,
            }),
            query: self.to_proto()?,
        })
    }
}
