use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type RecordId = i64;

/// Format the record source uses for datetime values.
pub const SERVER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SERVER_DATE_FORMAT: &str = "%Y-%m-%d";

static NULL_VALUE: Value = Value::Null;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Moves the point along the north-west diagonal.
    pub fn stacked(self, offset: f64) -> Self {
        Self {
            lat: self.lat + offset,
            lng: self.lng - offset,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            latitude: None,
            longitude: None,
            fields: Map::new(),
        }
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Missing fields read as `null`.
    pub fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL_VALUE)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.fields.get("display_name").and_then(Value::as_str)
    }

    /// Position usable for placement: both coordinates present, finite and non-zero.
    pub fn position(&self) -> Option<LatLng> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng))
                if lat.is_finite() && lng.is_finite() && lat != 0.0 && lng != 0.0 =>
            {
                Some(LatLng { lat, lng })
            }
            _ => None,
        }
    }

    pub fn set_position(&mut self, position: LatLng) {
        self.latitude = Some(position.lat);
        self.longitude = Some(position.lng);
    }
}

// the record source sends coordinates as numbers, numeric strings, `false` or `null`
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// `{id, display_name}` stub of a related record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelatedStub {
    pub id: RecordId,
    pub display_name: Option<String>,
}

impl RelatedStub {
    /// Accepts the object form, the legacy `[id, name]` pair and a bare id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                id: map.get("id")?.as_i64()?,
                display_name: map
                    .get("display_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            Value::Array(pair) if pair.len() == 2 => Some(Self {
                id: pair[0].as_i64()?,
                display_name: pair[1].as_str().map(str::to_string),
            }),
            Value::Number(n) => Some(Self {
                id: n.as_i64()?,
                display_name: None,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Scalar,
    Boolean,
    Selection,
    Date,
    Datetime,
    ManyToOne,
    OneToMany,
    ManyToMany,
    Properties,
}

impl FieldType {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "boolean" => FieldType::Boolean,
            "selection" => FieldType::Selection,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "many2one" => FieldType::ManyToOne,
            "one2many" => FieldType::OneToMany,
            "many2many" => FieldType::ManyToMany,
            "properties" => FieldType::Properties,
            _ => FieldType::Scalar,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            FieldType::Scalar => "char",
            FieldType::Boolean => "boolean",
            FieldType::Selection => "selection",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::ManyToOne => "many2one",
            FieldType::OneToMany => "one2many",
            FieldType::ManyToMany => "many2many",
            FieldType::Properties => "properties",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            FieldType::ManyToOne | FieldType::OneToMany | FieldType::ManyToMany
        )
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        FieldType::from_type_name(&name)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.type_name().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Human label of the field.
    #[serde(default)]
    pub string: Option<String>,
    /// Ordered `(value, label)` options of selection fields.
    #[serde(default)]
    pub selection: Vec<(Value, String)>,
}

impl FieldDescriptor {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            string: None,
            selection: Vec::new(),
        }
    }

    pub fn with_selection(mut self, options: Vec<(Value, String)>) -> Self {
        self.selection = options;
        self
    }

    pub fn label(&self) -> &str {
        self.string.as_deref().unwrap_or(&self.name)
    }
}

/// Falsy in the record source's sense: null, false, zero, empty string.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// String form used for group ids and map keys.
pub fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text shown to users for a field value; empty for falsy values.
pub fn display_value(value: &Value) -> String {
    if is_falsy(value) {
        return String::new();
    }

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match RelatedStub::from_value(item) {
                Some(RelatedStub {
                    display_name: Some(name),
                    ..
                }) => name,
                _ => display_value(item),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => match RelatedStub::from_value(value) {
            Some(stub) => stub.display_name.unwrap_or_else(|| stub.id.to_string()),
            None => value.to_string(),
        },
        other => value_to_key(other),
    }
}

pub fn parse_server_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, SERVER_DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

pub fn parse_server_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, SERVER_DATE_FORMAT)
        .ok()
        .or_else(|| parse_server_datetime(raw).map(|dt| dt.date()))
}
