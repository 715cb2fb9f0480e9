//! Per-request context.
//!
//! The [`RequestContext`] is the explicit per-request object threaded through
//! the handler chain. The access log middleware binds a [`LogContext`] into it
//! before invoking the next handler; code further down the chain reads it back
//! to build [`ApplicationEvent`]s that share the request's identity fields.
//!
//! # Example
//!
//! ```
//! use httplog_core::{BaseRecord, RequestContext};
//! use std::sync::Arc;
//!
//! let mut ctx = RequestContext::new();
//! assert!(ctx.new_event().is_err());
//!
//! let base = BaseRecord {
//!     service: "billing".to_string(),
//!     request_id: "req-1".to_string(),
//!     ..Default::default()
//! };
//! ctx.bind_log_context(base, Arc::new(|_: &RequestContext| "tx-1".to_string()));
//!
//! let event = ctx.new_event().unwrap();
//! assert_eq!(event.base.request_id, "req-1");
//! assert_eq!(event.transaction_id, "tx-1");
//! ```

use crate::error::{HttplogError, HttplogResult};
use crate::logger::{LogSink, RequestLogger};
use crate::schema::{ApplicationEvent, BaseRecord};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Produces a transaction id each time an event is built.
pub type TransactionIdFn = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// Identity snapshot and transaction id source bound for one request.
#[derive(Clone)]
pub struct LogContext {
    base: Arc<BaseRecord>,
    transaction_id: TransactionIdFn,
}

impl LogContext {
    /// Creates a log context.
    pub fn new(base: BaseRecord, transaction_id: TransactionIdFn) -> Self {
        Self {
            base: Arc::new(base),
            transaction_id,
        }
    }

    /// The identity snapshot.
    #[must_use]
    pub fn base(&self) -> &BaseRecord {
        &self.base
    }

    /// Shared handle to the identity snapshot.
    #[must_use]
    pub fn shared_base(&self) -> Arc<BaseRecord> {
        Arc::clone(&self.base)
    }

    /// The transaction id source.
    #[must_use]
    pub fn transaction_id_fn(&self) -> &TransactionIdFn {
        &self.transaction_id
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Context that flows through the handler chain for one request.
pub struct RequestContext {
    /// When the request entered the chain.
    started_at: Instant,

    /// Identity snapshot, bound by the access log middleware.
    log: Option<LogContext>,

    /// Per-request structured logger.
    logger: Option<RequestLogger>,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            log: None,
            logger: None,
            extensions: HashMap::new(),
        }
    }

    /// Creates a context with a per-request logger writing to `sink`.
    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        let mut ctx = Self::new();
        ctx.logger = Some(RequestLogger::new(sink));
        ctx
    }

    /// Returns when the request entered the chain.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since the request entered the chain.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Binds the identity snapshot and transaction id source.
    ///
    /// This should only be called by the access log middleware. A second
    /// bind (stacked middleware) replaces the first for the rest of the chain.
    pub fn bind_log_context(&mut self, base: BaseRecord, transaction_id: TransactionIdFn) {
        self.log = Some(LogContext::new(base, transaction_id));
    }

    /// Returns the bound log context.
    pub fn log_context(&self) -> HttplogResult<&LogContext> {
        self.log.as_ref().ok_or(HttplogError::MissingContext)
    }

    /// Builds an event carrying the request's identity fields and a fresh
    /// transaction id.
    ///
    /// # Errors
    ///
    /// Returns [`HttplogError::MissingContext`] when no middleware bound a
    /// log context.
    pub fn new_event(&self) -> HttplogResult<ApplicationEvent> {
        let log = self.log_context()?;
        Ok(ApplicationEvent {
            base: log.base().clone(),
            transaction_id: (log.transaction_id)(self),
            ..Default::default()
        })
    }

    /// Returns the per-request logger, if one was installed.
    #[must_use]
    pub fn logger(&self) -> Option<&RequestLogger> {
        self.logger.as_ref()
    }

    /// Returns the per-request logger, installing one for `sink` if absent.
    pub fn logger_or_install(&mut self, sink: &Arc<dyn LogSink>) -> &RequestLogger {
        self.logger
            .get_or_insert_with(|| RequestLogger::new(Arc::clone(sink)))
    }

    /// Replaces the per-request logger.
    pub fn set_logger(&mut self, logger: RequestLogger) {
        self.logger = Some(logger);
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("started_at", &self.started_at)
            .field("log", &self.log)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
