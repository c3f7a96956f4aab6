//! Data structures describing a service order as consumed by the report composer.
//!
//! The types mirror the projection returned by the data backend for a single
//! `service_orders` row joined with its `customers` and `technicians` rows.
//! Everything that can be missing on the wire is optional here, and the
//! loosely-typed parts of that projection (embedded joins that may arrive as
//! an object or as a one-element list, free-form status strings) are
//! normalised during deserialization so the composer only ever sees the
//! strongly-typed shape.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder printed for missing values.
pub const MISSING_VALUE: &str = "N/A";

/// Text printed when no accessory was received.
pub const NO_ACCESSORIES: &str = "Nenhum";

const DEFAULT_FILENAME_NUMBER: &str = "000";
const DEFAULT_FILENAME_CUSTOMER: &str = "cliente";

/// Inspection result of a single checklist entry.
///
/// Only `ok`, `defect` and `na` are known on the wire. Any other value, including
/// non-string JSON such as numbers or `null`, is read as
/// [`ItemStatus::NotVerified`] instead of being rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ItemStatus {
    /// The item was checked and works.
    Ok,
    /// The item was checked and is defective.
    Defect,
    /// The item was not verified.
    #[default]
    NotVerified,
}

impl ItemStatus {
    /// Short token printed in the checklist tables.
    pub fn token(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Defect => "Defeito",
            Self::NotVerified => "N/V",
        }
    }

    /// Wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Defect => "defect",
            Self::NotVerified => "na",
        }
    }
}

impl From<&str> for ItemStatus {
    fn from(value: &str) -> Self {
        match value {
            "ok" => Self::Ok,
            "defect" => Self::Defect,
            _ => Self::NotVerified,
        }
    }
}

impl From<String> for ItemStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ItemStatus> for String {
    fn from(status: ItemStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map_or(Self::NotVerified, Self::from))
    }
}

/// One row of a checklist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Label shown in the first column.
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// Inspection result.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ItemStatus,
    /// Optional free-text remark.
    #[serde(default)]
    pub observation: Option<String>,
}

impl ChecklistItem {
    /// Creates an item with the given label and status and no observation.
    pub fn new(label: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            label: label.into(),
            status,
            observation: None,
        }
    }

    /// Sets the observation and returns the updated item.
    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    /// Returns the observation text, or `-` when there is none.
    pub fn observation_or_dash(&self) -> &str {
        match self.observation.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => "-",
        }
    }
}

/// Ordered list of checklist items. The order is the printed order.
pub type ChecklistSection = Vec<ChecklistItem>;

/// Accessories handed over together with the equipment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessories {
    /// Power supply included.
    #[serde(rename = "fonte", default, deserialize_with = "null_as_default")]
    pub power_supply: bool,
    /// Cable included.
    #[serde(rename = "cabo", default, deserialize_with = "null_as_default")]
    pub cable: bool,
    /// Bag included.
    #[serde(rename = "mochila", default, deserialize_with = "null_as_default")]
    pub bag: bool,
    /// Anything else, as free text.
    #[serde(rename = "outro", default, deserialize_with = "null_as_default")]
    pub other: String,
}

impl Accessories {
    /// Returns the printable labels in their fixed order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = Vec::with_capacity(4);
        if self.power_supply {
            labels.push("Fonte");
        }
        if self.cable {
            labels.push("Cabo");
        }
        if self.bag {
            labels.push("Mochila");
        }
        let other = self.other.trim();
        if !other.is_empty() {
            labels.push(other);
        }
        labels
    }

    /// Returns the comma-joined summary line, or [`NO_ACCESSORIES`].
    pub fn summary(&self) -> String {
        let labels = self.labels();
        if labels.is_empty() {
            NO_ACCESSORIES.to_owned()
        } else {
            labels.join(", ")
        }
    }
}

/// Lifecycle state of a service order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Waiting for the technician (`pendente`).
    Pending,
    /// Being worked on (`em_atendimento`).
    InProgress,
    /// Finished (`concluido`).
    Completed,
    /// Any other value, kept verbatim.
    Other(String),
}

impl OrderStatus {
    /// Human-readable label printed in the report.
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pendente",
            Self::InProgress => "Em Atendimento",
            Self::Completed => "Concluído",
            Self::Other(raw) => raw,
        }
    }

    /// Wire representation of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pendente",
            Self::InProgress => "em_atendimento",
            Self::Completed => "concluido",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pendente" => Self::Pending,
            "em_atendimento" => Self::InProgress,
            "concluido" => Self::Completed,
            _ => Self::Other(value),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a raw status value to its label; unknown values are returned unchanged.
pub fn status_label(status: &str) -> String {
    OrderStatus::from(status.to_owned()).label().to_owned()
}

/// Customer embedded in the order projection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tax id (CPF).
    #[serde(rename = "cpf", default)]
    pub tax_id: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    /// Creates a customer with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Technician embedded in the order projection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A fully resolved service order, immutable while a report is generated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrderReport {
    /// Sequential order number.
    #[serde(rename = "os_number", default)]
    pub order_number: Option<i64>,
    /// Creation timestamp as stored by the backend.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Customer, unwrapped from either join shape.
    #[serde(alias = "customers", default, deserialize_with = "single_embedded")]
    pub customer: Option<Customer>,
    /// Responsible technician, unwrapped from either join shape.
    #[serde(alias = "technicians", default, deserialize_with = "single_embedded")]
    pub technician: Option<Technician>,
    /// Equipment description.
    #[serde(default)]
    pub equipment: Option<String>,
    /// Serial number.
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Problem reported by the customer.
    #[serde(default)]
    pub problem_description: Option<String>,
    /// "Estado Físico" checklist.
    #[serde(default, deserialize_with = "null_as_default")]
    pub physical_condition: ChecklistSection,
    /// "Condição de Funcionamento" checklist.
    #[serde(default, deserialize_with = "null_as_default")]
    pub operating_condition: ChecklistSection,
    /// "Testes Técnicos Iniciais" checklist.
    #[serde(default, deserialize_with = "null_as_default")]
    pub technical_tests: ChecklistSection,
    /// Accessories received with the equipment.
    #[serde(default, deserialize_with = "null_as_default")]
    pub accessories_received: Accessories,
    /// Technician remarks.
    #[serde(default)]
    pub technician_observation: Option<String>,
    /// Order status; absent or `null` when the backend has none.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Moment the customer signed, if they did.
    #[serde(default)]
    pub client_signed_at: Option<String>,
    /// Public photo URLs in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<String>,
}

impl ServiceOrderReport {
    /// Parses an order from the JSON projection returned by the backend.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Status label for the summary table, or [`MISSING_VALUE`] when unknown.
    pub fn status_label(&self) -> &str {
        match self.status.as_ref().map(OrderStatus::label) {
            Some(label) if !label.trim().is_empty() => label,
            _ => MISSING_VALUE,
        }
    }

    /// Returns the customer name, if known.
    pub fn customer_name(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|customer| non_blank(customer.name.as_deref()))
    }

    /// Returns the order number formatted for display.
    pub fn order_number_label(&self) -> String {
        self.order_number
            .map(|number| number.to_string())
            .unwrap_or_else(|| MISSING_VALUE.to_owned())
    }

    /// Returns the creation date as `dd/mm/yyyy`.
    pub fn created_date_label(&self) -> String {
        date_label(self.created_at.as_deref())
    }

    /// Returns the three checklists with their printed titles, in printed order.
    pub fn checklists(&self) -> [(&'static str, &[ChecklistItem]); 3] {
        [
            ("Estado Físico", &self.physical_condition),
            ("Condição de Funcionamento", &self.operating_condition),
            ("Testes Técnicos Iniciais", &self.technical_tests),
        ]
    }

    /// Returns the filename under which the report is saved.
    pub fn report_filename(&self) -> String {
        report_filename(self.order_number, self.customer_name())
    }
}

/// Builds `OS_<number>_<customer>.pdf`, replacing whitespace and path separators with `_`.
pub fn report_filename(order_number: Option<i64>, customer_name: Option<&str>) -> String {
    let number = order_number
        .map(|number| number.to_string())
        .unwrap_or_else(|| DEFAULT_FILENAME_NUMBER.to_owned());
    let customer: String = customer_name
        .unwrap_or(DEFAULT_FILENAME_CUSTOMER)
        .chars()
        .map(|ch| {
            if ch.is_whitespace() || ch == '/' || ch == '\\' {
                '_'
            } else {
                ch
            }
        })
        .collect();
    format!("OS_{number}_{customer}.pdf")
}

/// Formats a backend timestamp as `dd/mm/yyyy`.
///
/// RFC 3339 timestamps, naive date-times and plain dates are understood. Any
/// other non-empty value is returned verbatim and a missing value yields
/// [`MISSING_VALUE`].
pub fn date_label(value: Option<&str>) -> String {
    let Some(raw) = non_blank(value) else {
        return MISSING_VALUE.to_owned();
    };
    parse_date(raw)
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| raw.to_owned())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Returns the trimmed value when it is present and not blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Returns the trimmed value or [`MISSING_VALUE`].
pub fn or_missing(value: Option<&str>) -> Cow<'_, str> {
    match non_blank(value) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Borrowed(MISSING_VALUE),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Embedded<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Embedded<T> {
    fn into_single(self) -> Option<T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.into_iter().next(),
        }
    }
}

fn single_embedded<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let embedded = Option::<Embedded<T>>::deserialize(deserializer)?;
    Ok(embedded.and_then(Embedded::into_single))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
