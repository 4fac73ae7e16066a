//! SQL statement execution and parameter handling.
//!
//! A [`Statement`] without parameters is sent as a single `execute`
//! command. With parameters it is prepared on the server, executed once with
//! the values bound column-major, and closed again.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::error::QueryError;
use crate::types::{DATE_FORMAT, TIMESTAMP_FORMAT};

use super::context::ExecutionContext;
use super::prepared::PreparedStatement;
use super::results::{QueryResult, Rows};

/// A positional parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Sent as a hex string
    Binary(Vec<u8>),
    /// Sent as its decimal string to keep every digit
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Parameter {
    /// Wire representation inside `executePreparedStatement` data.
    pub fn to_json(&self) -> Value {
        match self {
            Parameter::Null => Value::Null,
            Parameter::Boolean(b) => Value::Bool(*b),
            Parameter::Integer(i) => Value::from(*i),
            // NaN and infinities have no JSON form
            Parameter::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Parameter::String(s) => Value::String(s.clone()),
            Parameter::Binary(b) => Value::String(hex::encode(b)),
            Parameter::Decimal(d) => Value::String(d.to_string()),
            Parameter::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Parameter::Timestamp(ts) => Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Parameter::Null)
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Boolean(value)
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Self {
        Parameter::Integer(value as i64)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Parameter::Integer(value)
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Parameter::Float(value)
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::String(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::String(value.to_string())
    }
}

impl From<Vec<u8>> for Parameter {
    fn from(value: Vec<u8>) -> Self {
        Parameter::Binary(value)
    }
}

impl From<&[u8]> for Parameter {
    fn from(value: &[u8]) -> Self {
        Parameter::Binary(value.to_vec())
    }
}

impl From<Decimal> for Parameter {
    fn from(value: Decimal) -> Self {
        Parameter::Decimal(value)
    }
}

impl From<NaiveDate> for Parameter {
    fn from(value: NaiveDate) -> Self {
        Parameter::Date(value)
    }
}

impl From<NaiveDateTime> for Parameter {
    fn from(value: NaiveDateTime) -> Self {
        Parameter::Timestamp(value)
    }
}

impl<T: Into<Parameter>> From<Option<T>> for Parameter {
    fn from(value: Option<T>) -> Self {
        value.map_or(Parameter::Null, Into::into)
    }
}

/// A parameter value as handed over by a caller that may name its
/// arguments. Only unnamed values can be bound.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParameter {
    pub name: String,
    pub value: Parameter,
}

impl NamedParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn positional(value: impl Into<Parameter>) -> Self {
        Self::new(String::new(), value)
    }
}

/// Strip the names off a parameter list, rejecting any that carry one.
pub fn values_from_named(params: Vec<NamedParameter>) -> Result<Vec<Parameter>, QueryError> {
    params
        .into_iter()
        .map(|param| {
            if param.name.is_empty() {
                Ok(param.value)
            } else {
                Err(QueryError::NamedParametersNotSupported)
            }
        })
        .collect()
}

/// A SQL statement with its positional parameters.
///
/// # Example
///
/// ```no_run
/// # use exasol_wire::query::{ExecutionContext, Statement};
/// # async fn example(context: ExecutionContext) -> Result<(), Box<dyn std::error::Error>> {
/// let inserted = Statement::new(context, "INSERT INTO t VALUES (?, ?)")
///     .bind(1)
///     .bind("one")
///     .bind(2)
///     .bind("two")
///     .execute_update()
///     .await?;
/// assert_eq!(inserted, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Statement {
    context: ExecutionContext,
    sql: String,
    parameters: Vec<Parameter>,
}

impl Statement {
    pub fn new(context: ExecutionContext, sql: impl Into<String>) -> Self {
        Self {
            context,
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Append one value to the flat parameter list.
    pub fn bind(mut self, value: impl Into<Parameter>) -> Self {
        self.parameters.push(value.into());
        self
    }

    /// Append several values to the flat parameter list.
    pub fn bind_all<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Parameter>,
    {
        self.parameters.extend(values.into_iter().map(Into::into));
        self
    }

    /// Append values that may carry names.
    ///
    /// Fails with [`QueryError::NamedParametersNotSupported`] if any name is
    /// set.
    pub fn bind_named(mut self, values: Vec<NamedParameter>) -> Result<Self, QueryError> {
        self.parameters.extend(values_from_named(values)?);
        Ok(self)
    }

    /// Run the statement.
    pub async fn execute(&self) -> Result<QueryResult, QueryError> {
        if self.parameters.is_empty() {
            self.execute_direct().await
        } else {
            self.execute_prepared().await
        }
    }

    /// Run a statement that does not produce rows.
    pub async fn execute_update(&self) -> Result<i64, QueryError> {
        self.execute().await?.into_row_count().await
    }

    /// Run a query.
    pub async fn query(&self) -> Result<Rows, QueryError> {
        self.execute().await?.into_rows()
    }

    async fn execute_direct(&self) -> Result<QueryResult, QueryError> {
        debug!(sql = %self.sql, "executing statement");
        let sql = self.sql.clone();
        let attributes = self.context.attributes().clone();
        let response = self
            .context
            .run(move |t| Box::pin(async move { t.execute(&sql, &attributes).await }))
            .await?;

        QueryResult::from_response(&response, &self.context)
    }

    async fn execute_prepared(&self) -> Result<QueryResult, QueryError> {
        debug!(
            sql = %self.sql,
            parameters = self.parameters.len(),
            "executing statement with parameters"
        );
        let mut prepared = PreparedStatement::prepare(self.context.clone(), &self.sql).await?;

        match prepared.execute(&self.parameters).await {
            // The result set is still being read; it releases the statement when closed
            Ok(QueryResult::Rows(rows)) if rows.handle().is_some() => {
                Ok(QueryResult::Rows(rows.with_statement(prepared.detach())))
            }
            outcome => {
                let closed = prepared.close().await;
                let result = outcome?;
                closed?;
                Ok(result)
            }
        }
    }
}
