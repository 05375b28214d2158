//! Metrics and observability infrastructure.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and HTTP endpoint

pub mod events;
pub mod server;

pub use server::init;

/// Emit an internal event as a metric.
///
/// Calls `InternalEvent::emit()` on the given event, recording the
/// corresponding Prometheus metric.
///
/// # Example
///
/// ```ignore
/// emit!(RecordsEncoded { count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
