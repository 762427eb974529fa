use crate::errors::BoxError;
use crate::grouping::GroupBySpec;
use crate::records::{FieldDescriptor, Record};
use ahash::AHashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::path::Path;

pub const DEFAULT_LIMIT: usize = 80;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefaultOrder {
    pub name: String,
    #[serde(default = "default_true")]
    pub asc: bool,
}

fn default_true() -> bool {
    true
}

/// What the view asks the map to show.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapQuery {
    pub res_model: String,
    #[serde(default)]
    pub domain: Value,
    #[serde(default)]
    pub field_names: Vec<String>,
    #[serde(default)]
    pub fields: AHashMap<String, FieldDescriptor>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub default_order: Option<DefaultOrder>,
    #[serde(default)]
    pub routing: bool,
    #[serde(default)]
    pub hide_name: bool,
    #[serde(default)]
    pub has_form_view: bool,
    #[serde(default)]
    pub popup_field_names: Vec<String>,
    #[serde(default)]
    pub panel_title: Option<String>,
    #[serde(default)]
    pub context: Value,
}

impl MapQuery {
    /// Descriptor of `name`, falling back to a plain scalar field.
    pub fn descriptor(&self, name: &str) -> FieldDescriptor {
        match self.fields.get(name) {
            Some(field) => FieldDescriptor {
                name: name.to_string(),
                ..field.clone()
            },
            None => FieldDescriptor::new(name, crate::records::FieldType::Scalar),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchReadRequest {
    pub model: String,
    pub domain: Value,
    pub specification: Map<String, Value>,
    pub limit: usize,
    pub offset: usize,
    pub order: String,
    pub context: Value,
}

impl SearchReadRequest {
    pub fn from_query(query: &MapQuery, group_by: Option<&GroupBySpec>) -> Self {
        let mut specification = Map::new();

        let grouped_field = group_by.map(|spec| spec.field.as_str());
        for name in query.field_names.iter().map(String::as_str).chain(grouped_field) {
            let relational = query
                .fields
                .get(name)
                .is_some_and(|field| field.field_type.is_relational());

            let entry = if relational {
                json!({"fields": {"display_name": {}}})
            } else {
                json!({})
            };
            specification.insert(name.to_string(), entry);
        }

        let order = match &query.default_order {
            Some(order) if order.asc => format!("{} ASC", order.name),
            Some(order) => format!("{} DESC", order.name),
            None => String::new(),
        };

        Self {
            model: query.res_model.clone(),
            domain: query.domain.clone(),
            specification,
            limit: query.limit,
            offset: query.offset,
            order,
            context: query.context.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchReadResult {
    pub records: Vec<Record>,
    pub length: usize,
}

/// Backend the map pulls its records from.
pub trait RecordSource: Send + Sync {
    fn search_read<'a>(
        &'a self,
        request: &'a SearchReadRequest,
    ) -> BoxFuture<'a, Result<SearchReadResult, BoxError>>;
}

/// Records served from a JSON document. Domains are not evaluated.
#[derive(Clone, Debug, Default)]
pub struct JsonRecordSource {
    records: Vec<Record>,
}

impl JsonRecordSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Accepts either a bare array or a `{records: [...]}` document.
    pub fn from_path(path: &Path) -> Result<Self, BoxError> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)?;

        let records = match document {
            Value::Object(mut map) => map.remove("records").unwrap_or(Value::Array(vec![])),
            other => other,
        };

        Ok(Self {
            records: serde_json::from_value(records)?,
        })
    }

    fn read(&self, request: &SearchReadRequest) -> SearchReadResult {
        let mut records = self.records.clone();

        if let Some((field, descending)) = parse_order(&request.order) {
            records.sort_by(|a, b| {
                let ordering = compare_values(a.field(field), b.field(field));
                if descending { ordering.reverse() } else { ordering }
            });
        }

        let length = records.len();
        let records = records
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();

        SearchReadResult { records, length }
    }
}

impl RecordSource for JsonRecordSource {
    fn search_read<'a>(
        &'a self,
        request: &'a SearchReadRequest,
    ) -> BoxFuture<'a, Result<SearchReadResult, BoxError>> {
        Box::pin(async move { Ok(self.read(request)) })
    }
}

fn parse_order(order: &str) -> Option<(&str, bool)> {
    let mut parts = order.split_whitespace();
    let field = parts.next()?;
    let descending = parts
        .next()
        .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));

    Some((field, descending))
}

// numbers, strings, lists, objects, `true`, then empty values
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Array(_) => 2,
        Value::Object(_) => 3,
        Value::Bool(true) => 4,
        Value::Bool(false) | Value::Null => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default()),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FieldType;

    fn query() -> MapQuery {
        let mut fields = AHashMap::new();
        fields.insert(
            "partner_id".to_string(),
            FieldDescriptor::new("partner_id", FieldType::ManyToOne),
        );
        fields.insert("name".to_string(), FieldDescriptor::new("name", FieldType::Scalar));
        fields.insert(
            "tag_ids".to_string(),
            FieldDescriptor::new("tag_ids", FieldType::ManyToMany),
        );

        MapQuery {
            res_model: "project.task".to_string(),
            field_names: vec!["name".to_string(), "partner_id".to_string()],
            fields,
            limit: 2,
            default_order: Some(DefaultOrder {
                name: "name".to_string(),
                asc: false,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn request_includes_grouped_field_and_display_names() {
        let spec = GroupBySpec::parse("tag_ids");
        let request = SearchReadRequest::from_query(&query(), Some(&spec));

        assert_eq!(request.specification["name"], json!({}));
        assert_eq!(
            request.specification["partner_id"],
            json!({"fields": {"display_name": {}}})
        );
        assert_eq!(
            request.specification["tag_ids"],
            json!({"fields": {"display_name": {}}})
        );
        assert_eq!(request.order, "name DESC");
        assert_eq!(request.limit, 2);
    }

    #[test]
    fn query_defaults() {
        let query: MapQuery = serde_json::from_value(json!({"res_model": "res.partner"})).unwrap();
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert!(!query.routing);
        assert_eq!(query.descriptor("city").field_type, FieldType::Scalar);
    }

    #[test]
    fn mixed_values_sort_in_a_total_order() {
        let samples = [
            json!(null),
            json!(false),
            json!(true),
            json!(3),
            json!(-1.5),
            json!("b"),
            json!("a"),
            json!([1, "x"]),
            json!({"id": 2}),
            json!(""),
            json!(0),
        ];
        let mut values: Vec<Value> = (0..3000)
            .map(|i: usize| samples[(i * 7919 + i / 13) % samples.len()].clone())
            .collect();

        values.sort_by(compare_values);

        assert!(
            values
                .windows(2)
                .all(|pair| compare_values(&pair[0], &pair[1]) != Ordering::Greater)
        );
        assert_eq!(values[0], json!(-1.5));
        assert!(values.last().unwrap().is_null() || values.last() == Some(&json!(false)));
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Equal);
        assert_eq!(compare_values(&json!(null), &json!(null)), Ordering::Equal);
        assert_eq!(compare_values(&json!("z"), &json!(null)), Ordering::Less);
    }

    #[tokio::test]
    async fn json_source_orders_and_pages() {
        let source = JsonRecordSource::new(vec![
            Record::new(1).with_field("name", json!("b")),
            Record::new(2).with_field("name", json!("c")),
            Record::new(3).with_field("name", json!("a")),
        ]);
        let request = SearchReadRequest::from_query(&query(), None);

        let result = source.search_read(&request).await.unwrap();

        assert_eq!(result.length, 3);
        assert_eq!(
            result.records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }
}
