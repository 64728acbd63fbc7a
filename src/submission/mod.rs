//! Final-step submission: payload assembly, the sink seam and the HTTP sink.

mod coordinator;
mod sink;

pub use coordinator::{SubmissionCoordinator, SubmissionResult};
pub use sink::{HttpSubmissionSink, SinkError, SinkReceipt, SubmissionPayload, SubmissionSink};
