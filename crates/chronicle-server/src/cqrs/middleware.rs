//! Marker traits separating writes from reads.
//!
//! Commands mutate subjects and are themselves audited by the coordinator;
//! queries only read recorded history.

/// A write operation.
pub trait Command {}

/// A read-only operation.
pub trait Query {}
