//! Buckets records into named groups by the declared type of one field.
//!
//! Every field type maps to one extractor that turns a raw field value into
//! `(id, label)` pairs. An empty result, or a pair whose id and label are both
//! falsy, sends the record to the shared fallback group.

pub mod dates;

use crate::config::GroupLabels;
use crate::records::{
    FieldDescriptor, FieldType, Record, RelatedStub, is_falsy, parse_server_date,
    parse_server_datetime, value_to_key,
};
use ahash::AHashMap;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dates::DateGranularity;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub label: String,
    /// Indices into the record list the group was built from.
    pub members: Vec<usize>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups in order of first appearance.
pub type GroupMap = IndexMap<String, Group>;

/// Parsed `field` or `field:granularity` grouping token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBySpec {
    pub raw: String,
    pub field: String,
    pub granularity: Option<DateGranularity>,
}

impl GroupBySpec {
    pub fn parse(token: &str) -> Self {
        let (field, granularity) = match token.split_once(':') {
            Some((field, granularity)) => {
                let parsed = DateGranularity::from_token(granularity).unwrap_or_else(|| {
                    warn!(
                        "unknown date granularity '{}' for {}, grouping by month",
                        granularity, field
                    );
                    DateGranularity::Month
                });
                (field, Some(parsed))
            }
            None => (token, None),
        };

        Self {
            raw: token.to_string(),
            field: field.to_string(),
            granularity,
        }
    }
}

/// First usable grouping of a group-by list; properties fields are dropped.
pub fn effective_group_by(
    group_by: &[String],
    fields: &AHashMap<String, FieldDescriptor>,
) -> Option<GroupBySpec> {
    group_by
        .iter()
        .filter(|token| {
            // properties entries look like `field.key`
            let field_name = token.split(['.', ':']).next().unwrap_or_default();
            fields
                .get(field_name)
                .is_none_or(|field| field.field_type != FieldType::Properties)
        })
        .map(|token| GroupBySpec::parse(token))
        .next()
}

struct ExtractContext<'a> {
    field: &'a FieldDescriptor,
    granularity: DateGranularity,
    labels: &'a GroupLabels,
}

type Extractor = fn(&ExtractContext<'_>, &Value) -> Vec<(Value, Value)>;

fn extractor_for(field_type: FieldType) -> Option<Extractor> {
    match field_type {
        FieldType::OneToMany | FieldType::ManyToMany => Some(extract_related_list),
        FieldType::Date => Some(extract_date),
        FieldType::Datetime => Some(extract_datetime),
        FieldType::Boolean => Some(extract_boolean),
        FieldType::Selection => Some(extract_selection),
        FieldType::ManyToOne => Some(extract_many_to_one),
        FieldType::Scalar => Some(extract_scalar),
        FieldType::Properties => None,
    }
}

fn extract_related_list(_: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(RelatedStub::from_value)
        .map(|stub| {
            let label = stub.display_name.map(Value::String).unwrap_or(Value::Null);
            (Value::from(stub.id), label)
        })
        .collect()
}

fn date_bucket(ctx: &ExtractContext<'_>, value: &Value, datetime: bool) -> Vec<(Value, Value)> {
    if is_falsy(value) {
        return Vec::new();
    }

    let raw = value.as_str().unwrap_or_default();
    let date = if datetime {
        parse_server_datetime(raw).map(|dt| dt.date())
    } else {
        parse_server_date(raw)
    };

    match date {
        Some(date) => {
            let label = Value::String(ctx.granularity.label(date));
            vec![(label.clone(), label)]
        }
        None => {
            warn!("cannot parse {} value {} for grouping", ctx.field.name, value);
            Vec::new()
        }
    }
}

fn extract_date(ctx: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    date_bucket(ctx, value, false)
}

fn extract_datetime(ctx: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    date_bucket(ctx, value, true)
}

fn extract_boolean(ctx: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    let label = if is_falsy(value) {
        &ctx.labels.no
    } else {
        &ctx.labels.yes
    };
    let label = Value::String(label.clone());
    vec![(label.clone(), label)]
}

fn extract_selection(ctx: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    let resolved = ctx
        .field
        .selection
        .iter()
        .find(|(option, _)| option == value)
        .map(|(_, label)| Value::String(label.clone()))
        .unwrap_or_else(|| value.clone());

    vec![(resolved.clone(), resolved)]
}

fn extract_many_to_one(_: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    if is_falsy(value) {
        return vec![(value.clone(), value.clone())];
    }

    match RelatedStub::from_value(value) {
        Some(stub) => {
            let label = stub.display_name.map(Value::String).unwrap_or(Value::Null);
            vec![(Value::from(stub.id), label)]
        }
        None => vec![(value.clone(), value.clone())],
    }
}

fn extract_scalar(_: &ExtractContext<'_>, value: &Value) -> Vec<(Value, Value)> {
    vec![(value.clone(), value.clone())]
}

#[derive(Clone, Debug, Default)]
pub struct FieldGroupingEngine {
    labels: GroupLabels,
}

impl FieldGroupingEngine {
    pub fn new(labels: GroupLabels) -> Self {
        Self { labels }
    }

    pub fn fallback_label(&self) -> &str {
        &self.labels.none
    }

    pub fn group(
        &self,
        records: &[Record],
        field: &FieldDescriptor,
        granularity: Option<DateGranularity>,
    ) -> GroupMap {
        let mut groups = GroupMap::new();

        let Some(extract) = extractor_for(field.field_type) else {
            warn!("{} cannot be grouped on", field.name);
            return groups;
        };

        let ctx = ExtractContext {
            field,
            granularity: granularity.unwrap_or_default(),
            labels: &self.labels,
        };

        for (index, record) in records.iter().enumerate() {
            let buckets: Vec<(Value, Value)> = extract(&ctx, record.field(&field.name))
                .into_iter()
                .filter(|(id, label)| !(is_falsy(id) && is_falsy(label)))
                .collect();

            if buckets.is_empty() {
                let none = self.fallback_label().to_string();
                add_to_group(&mut groups, none.clone(), none, index);
                continue;
            }

            for (id, label) in buckets {
                let id = value_to_key(&id);
                let label = match label {
                    Value::String(label) => label,
                    Value::Null => id.clone(),
                    other => value_to_key(&other),
                };
                add_to_group(&mut groups, id, label, index);
            }
        }

        groups
    }
}

fn add_to_group(groups: &mut GroupMap, id: String, label: String, index: usize) {
    let group = groups.entry(id.clone()).or_insert_with(|| Group {
        id,
        label,
        members: Vec::new(),
    });

    // a relation listing the same record twice still counts once
    if group.members.last() != Some(&index) {
        group.members.push(index);
    }
}
