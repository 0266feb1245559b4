mod order;
mod record;
pub mod testing;

pub use order::{InvalidOrderError, RecordOrder};
pub use record::{Fragment, FragmentEntry, RawRecord, RecordBody, RecordMeta, RecordPage, RecordRef};

/// Aggregate record whose inner entries were all signed up front.
pub const AGGREGATE_COMPLETE_TYPE: u16 = 16705;
/// Aggregate record cosigned after announcement.
pub const AGGREGATE_BONDED_TYPE: u16 = 16961;
/// Inner entry type carrying a message payload.
pub const TRANSFER_TYPE: u16 = 16724;
