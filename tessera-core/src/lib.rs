//! TESSERA Core - Records, Filters and the Error Taxonomy
//!
//! Pure data types shared by every collection accessor. No I/O lives here:
//! the storage crate owns caching and the backend seam, the client crate owns
//! the wire transport.

pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod params;
pub mod record;
pub mod sink;

pub use classify::{classify, BackendErrorPayload, ErrorClassifier, Failure, ERROR_LOG_TARGET};
pub use config::Environment;
pub use error::{AppError, AppResult, ErrorKind, FieldReasons};
pub use filter::{quote, Filter, FilterExpr, FilterOperator, FilterValue};
pub use params::{ListParams, ListQuery, RecordParams, RecordQuery, DEFAULT_PER_PAGE, DEFAULT_SORT};
pub use record::{total_pages, ChangeAction, ChangeEvent, Entity, ListResult, Record};
pub use sink::{ErrorSink, MemorySink, NoopSink, TracingSink};
