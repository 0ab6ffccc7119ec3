//! Wire shapes of the statement execution service
//!
//! These mirror the service's JSON documents field for field. Decoding into
//! typed values happens in [`crate::result`], not here.

use serde::{Deserialize, Serialize};

use crate::types::SqlParameter;

/// Body of a submit call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitRequest {
    /// Statement text, sent unchanged
    pub sql: String,
    /// Target database
    pub database: String,
    /// Serverless workgroup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup_name: Option<String>,
    /// Provisioned cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_identifier: Option<String>,
    /// Database user (provisioned clusters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_user: Option<String>,
    /// Named parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SqlParameter>,
    /// Idempotency key; resends of the same request carry the same token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// Response to a submit call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitResponse {
    /// Statement identifier
    pub id: String,
}

/// Body of describe, result and cancel calls
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatementIdRequest<'a> {
    /// Statement identifier
    pub id: &'a str,
    /// Continuation token (result calls only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<&'a str>,
}

/// Response to a describe call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeResponse {
    /// Statement identifier
    pub id: String,
    /// Raw status string
    pub status: String,
    /// Diagnostic on failure
    #[serde(default)]
    pub error: Option<String>,
    /// Whether a result set exists
    #[serde(default)]
    pub has_result_set: Option<bool>,
    /// Rows produced, -1 while unknown
    #[serde(default)]
    pub result_rows: Option<i64>,
}

/// Response to a cancel call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancelResponse {
    /// Whether the cancel request was accepted
    pub status: bool,
}

/// Column description as sent by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireColumn {
    /// Column name; `?column?` for unnamed expressions
    #[serde(default)]
    pub name: String,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Engine type name, e.g. `int8`, `numeric`, `varchar`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl WireColumn {
    /// Column with a name and type
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            type_name: Some(type_name.into()),
        }
    }
}

/// One cell as sent by the service
///
/// Exactly one value field is expected to be populated, or `isNull` is
/// true. The shape itself does not enforce this; [`crate::result::Cell`]
/// does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireField {
    /// Null marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_null: Option<bool>,
    /// Boolean value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    /// 64-bit integer value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_value: Option<i64>,
    /// Double value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    /// Text value, also used for numeric, date and time types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_value: Option<String>,
}

impl WireField {
    /// A null cell
    pub fn null() -> Self {
        Self {
            is_null: Some(true),
            ..Default::default()
        }
    }

    /// A text cell
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Default::default()
        }
    }

    /// An integer cell
    pub fn long(value: i64) -> Self {
        Self {
            long_value: Some(value),
            ..Default::default()
        }
    }

    /// A double cell
    pub fn double(value: f64) -> Self {
        Self {
            double_value: Some(value),
            ..Default::default()
        }
    }

    /// A boolean cell
    pub fn boolean(value: bool) -> Self {
        Self {
            boolean_value: Some(value),
            ..Default::default()
        }
    }
}

/// One page of a statement's result
///
/// Column metadata accompanies the first page; later pages may omit it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultPage {
    /// Column metadata
    #[serde(default, rename = "ColumnMetadata", skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<WireColumn>>,
    /// Rows of cells
    #[serde(default)]
    pub records: Vec<Vec<WireField>>,
    /// Continuation token, absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    /// Total rows across all pages
    #[serde(default, rename = "TotalNumRows", skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<i64>,
}

impl ResultPage {
    /// First page carrying column metadata
    pub fn with_columns(columns: Vec<WireColumn>, records: Vec<Vec<WireField>>) -> Self {
        Self {
            columns: Some(columns),
            records,
            next_token: None,
            total_rows: None,
        }
    }

    /// Follow-up page without column metadata
    pub fn continuation(records: Vec<Vec<WireField>>) -> Self {
        Self {
            columns: None,
            records,
            next_token: None,
            total_rows: None,
        }
    }

    /// Set the continuation token
    pub fn next(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }
}
