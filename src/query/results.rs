//! Result decoding and lazy row iteration.
//!
//! A reply to `execute` carries one or more results. Each is either a row
//! count or a result set; result sets hold the first page of rows and, when
//! more remain on the server, a handle to fetch the rest.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConversionError, QueryError};
use crate::transport::messages::{
    FetchResponseData, ResultPayload, ResultSetData, ResultSetHandle, ResultsResponse,
};
use crate::types::{ColumnMetadata, FromValue, Schema, SqlValue, ValueError};

use super::context::ExecutionContext;

/// Interpret one entry of a `results` array.
pub fn decode_result(raw: &Value) -> Result<ResultPayload, QueryError> {
    ResultPayload::deserialize(raw)
        .map_err(|e| QueryError::MalformedData(format!("{}: {}", e, raw)))
}

/// First logical result of a reply; further results are ignored.
pub fn first_result(response: &ResultsResponse) -> Result<ResultPayload, QueryError> {
    if response.num_results == 0 {
        return Err(QueryError::MalformedData(
            "response contains no results".to_string(),
        ));
    }

    let raw = response.results.first().ok_or_else(|| {
        QueryError::MalformedData(format!(
            "numResults is {} but results are missing",
            response.num_results
        ))
    })?;

    if response.results.len() > 1 {
        debug!(
            count = response.results.len(),
            "ignoring results after the first"
        );
    }

    decode_result(raw)
}

/// Outcome of running a statement.
pub enum QueryResult {
    /// Affected rows of DML and DDL
    RowCount(i64),
    /// Rows of a query
    Rows(Rows),
}

impl QueryResult {
    pub(crate) fn from_response(
        response: &ResultsResponse,
        context: &ExecutionContext,
    ) -> Result<Self, QueryError> {
        match first_result(response)? {
            ResultPayload::RowCount(data) => Ok(QueryResult::RowCount(data.row_count)),
            ResultPayload::ResultSet(envelope) => Ok(QueryResult::Rows(Rows::new(
                envelope.result_set,
                context.clone(),
            )?)),
        }
    }

    pub fn row_count(&self) -> Option<i64> {
        match self {
            QueryResult::RowCount(count) => Some(*count),
            QueryResult::Rows(_) => None,
        }
    }

    pub fn is_result_set(&self) -> bool {
        matches!(self, QueryResult::Rows(_))
    }

    /// The rows, or an error for a row count.
    pub fn into_rows(self) -> Result<Rows, QueryError> {
        match self {
            QueryResult::Rows(rows) => Ok(rows),
            QueryResult::RowCount(count) => Err(QueryError::NoResultSet(format!(
                "statement returned a row count of {}",
                count
            ))),
        }
    }

    /// The row count. A result set is closed and reported as an error.
    pub async fn into_row_count(self) -> Result<i64, QueryError> {
        match self {
            QueryResult::RowCount(count) => Ok(count),
            QueryResult::Rows(mut rows) => {
                rows.close().await?;
                Err(QueryError::UnexpectedResultSet)
            }
        }
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::RowCount(count) => f.debug_tuple("RowCount").field(count).finish(),
            QueryResult::Rows(rows) => f.debug_tuple("Rows").field(rows).finish(),
        }
    }
}

/// Forward-only rows of a result set.
///
/// Rows beyond the first message are fetched on demand. The server-side
/// cursor is closed once the last row was read or on [`Rows::close`].
pub struct Rows {
    context: ExecutionContext,
    schema: Arc<Schema>,
    handle: Option<ResultSetHandle>,
    total_rows: u64,
    /// Rows received so far, the start position of the next fetch
    received: u64,
    /// Rows handed out so far
    position: u64,
    buffer: VecDeque<Vec<Value>>,
    /// Prepared statement released together with the cursor
    statement: Option<i32>,
    closed: bool,
}

impl Rows {
    pub(crate) fn new(data: ResultSetData, context: ExecutionContext) -> Result<Self, QueryError> {
        if data.columns.len() != data.num_columns {
            return Err(QueryError::MalformedData(format!(
                "numColumns is {} but {} columns are described",
                data.num_columns,
                data.columns.len()
            )));
        }

        let rows = data.data.unwrap_or_default();
        if rows.len() as u64 > data.num_rows {
            return Err(QueryError::MalformedData(format!(
                "numRows is {} but {} rows were sent",
                data.num_rows,
                rows.len()
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != data.num_columns) {
            return Err(QueryError::MalformedData(format!(
                "row has {} values for {} columns",
                row.len(),
                data.num_columns
            )));
        }

        let handle = data.result_set_handle.map(ResultSetHandle::new);
        debug!(
            handle = ?handle,
            total_rows = data.num_rows,
            first_page = rows.len(),
            "result set opened"
        );

        Ok(Self {
            context,
            schema: Arc::new(Schema::from_columns(&data.columns)),
            handle,
            total_rows: data.num_rows,
            received: rows.len() as u64,
            position: 0,
            buffer: rows.into(),
            statement: None,
            closed: false,
        })
    }

    /// Close the prepared statement `handle` when this result set is closed.
    pub(crate) fn with_statement(mut self, handle: i32) -> Self {
        self.statement = Some(handle);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        self.schema.columns()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Row count reported by the server.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn handle(&self) -> Option<ResultSetHandle> {
        self.handle
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn has_more_on_server(&self) -> bool {
        !self.closed && self.handle.is_some() && self.received < self.total_rows
    }

    /// Next row, fetching another page when the buffer runs dry.
    pub async fn next_row(&mut self) -> Result<Option<Row>, QueryError> {
        if self.buffer.is_empty() && self.has_more_on_server() {
            self.fetch_page().await?;
        }

        match self.buffer.pop_front() {
            Some(values) => {
                let row = Row {
                    schema: Arc::clone(&self.schema),
                    values,
                    position: self.position,
                };
                self.position += 1;
                Ok(Some(row))
            }
            None => {
                self.close().await?;
                Ok(None)
            }
        }
    }

    async fn fetch_page(&mut self) -> Result<(), QueryError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        let start = self.received;
        let num_bytes = self.context.fetch_size_bytes();

        debug!(handle = handle.as_i32(), start, num_bytes, "fetching rows");
        let page: FetchResponseData = self
            .context
            .run(move |t| Box::pin(t.fetch(handle, start, num_bytes)))
            .await?;

        if page.data.is_empty() {
            return Err(QueryError::MalformedData(format!(
                "fetch at position {} returned no rows, {} expected",
                start, self.total_rows
            )));
        }
        if let Some(row) = page.data.iter().find(|row| row.len() != self.schema.len()) {
            return Err(QueryError::MalformedData(format!(
                "row has {} values for {} columns",
                row.len(),
                self.schema.len()
            )));
        }

        self.received += page.data.len() as u64;
        self.buffer.extend(page.data);
        Ok(())
    }

    /// Release the server-side cursor. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), QueryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();

        let mut result = Ok(());
        if let Some(handle) = self.handle {
            debug!(handle = handle.as_i32(), "closing result set");
            result = self
                .context
                .run(move |t| Box::pin(t.close_result_set(handle)))
                .await;
        }
        if let Some(statement) = self.statement.take() {
            let closed = self
                .context
                .run(move |t| Box::pin(t.close_prepared_statement(statement)))
                .await;
            result = result.and(closed);
        }
        result
    }

    /// Read all remaining rows.
    pub async fn collect_rows(mut self) -> Result<Vec<Row>, QueryError> {
        let mut rows = Vec::with_capacity(self.buffer.len());
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Adapt into a [`Stream`] of rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, QueryError>> + Send {
        stream::try_unfold(self, |mut rows| async move {
            let next = rows.next_row().await?;
            Ok::<_, QueryError>(next.map(|row| (row, rows)))
        })
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.schema.names().collect::<Vec<_>>())
            .field("handle", &self.handle)
            .field("total_rows", &self.total_rows)
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(handle) = self.handle {
            warn!(
                handle = handle.as_i32(),
                "result set dropped without close(), server cursor stays open"
            );
        }
        if let Some(statement) = self.statement {
            warn!(
                handle = statement,
                "result set dropped without close(), prepared statement leaks"
            );
        }
    }
}

/// One row of a result set. Cells are decoded when read.
#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Value>,
    position: u64,
}

impl Row {
    /// 0-based position of the row in its result set.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The cell as sent by the server.
    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Decode the cell at `index` according to its column type.
    pub fn value(&self, index: usize) -> Result<SqlValue, ConversionError> {
        let column = self.schema.column(index)?;
        let raw = self
            .values
            .get(index)
            .ok_or(ConversionError::ColumnIndexOutOfBounds {
                index,
                count: self.values.len(),
            })?;

        SqlValue::decode(&column.data_type, raw).map_err(|e| self.conversion_error(index, e))
    }

    /// Read the cell at `index` as `T`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, ConversionError> {
        let value = self.value(index)?;
        T::from_value(value).map_err(|e| self.conversion_error(index, e))
    }

    /// Read the cell of the named column as `T`.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, ConversionError> {
        self.get(self.schema.index_of(name)?)
    }

    /// Decode every cell; fails on the first bad one.
    pub fn values(&self) -> Result<Vec<SqlValue>, ConversionError> {
        (0..self.values.len()).map(|i| self.value(i)).collect()
    }

    fn conversion_error(&self, column: usize, error: ValueError) -> ConversionError {
        match error {
            ValueError::UnexpectedNull => ConversionError::UnexpectedNull {
                row: self.position,
                column,
            },
            ValueError::UnsupportedType(exasol_type) => {
                ConversionError::UnsupportedType { exasol_type }
            }
            other => ConversionError::ValueConversionFailed {
                row: self.position,
                column,
                message: other.to_string(),
            },
        }
    }
}
