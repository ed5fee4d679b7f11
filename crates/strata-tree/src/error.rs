//! Error types for the entry tree.

use strata_chain::ChainLink;
use strata_types::Path;

/// Errors that can occur while mutating the tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Stored entries must carry at least one chain link.
    #[error("entry at {0} has an empty chain")]
    EmptyChain(Path),

    /// The chain head already names the current value of another entry.
    #[error("write {link} already heads {existing}, cannot also head {path}")]
    HeadInUse {
        /// The conflicting head.
        link: ChainLink,
        /// Entry currently indexed under that head.
        existing: Path,
        /// Entry that tried to claim it.
        path: Path,
    },
}
