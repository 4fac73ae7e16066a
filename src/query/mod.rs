//! Query execution and result handling.
//!
//! The query module is organized into:
//! - `context` - transport plus session settings, with request timeouts
//! - `statement` - parameters and one-shot statements
//! - `prepared` - prepared statements and column-major binding
//! - `results` - result decoding and lazy row iteration
//!
//! # Example
//!
//! ```no_run
//! use exasol_wire::query::{ExecutionContext, Statement};
//!
//! # async fn example(context: ExecutionContext) -> Result<(), Box<dyn std::error::Error>> {
//! let mut rows = Statement::new(context, "SELECT id, name FROM users WHERE age > ?")
//!     .bind(18)
//!     .query()
//!     .await?;
//!
//! while let Some(row) = rows.next_row().await? {
//!     let id: i64 = row.get(0)?;
//!     let name: Option<String> = row.get_by_name("NAME")?;
//!     println!("{} {:?}", id, name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod prepared;
pub mod results;
pub mod statement;

pub use context::ExecutionContext;
pub use prepared::{bind_columns, PreparedStatement};
pub use results::{decode_result, first_result, QueryResult, Row, Rows};
pub use statement::{values_from_named, NamedParameter, Parameter, Statement};
