pub mod ids;
pub mod payload;
pub mod record;
pub mod stats;

pub use ids::{JobId, WorkerIdentity};
pub use payload::{Payload, PayloadValue};
pub use record::JobRecord;
pub use stats::{StatKind, TopicStats};
