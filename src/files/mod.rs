//! File metadata: owner-gated records and the share-link lifecycle.

mod gate;
mod record;
mod share;

pub use gate::FileGate;
pub use record::{FileRecord, ShareState};
pub use share::ShareLinkManager;
