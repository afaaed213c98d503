//! Stage 1 investigators.
//!
//! - `RepoInvestigator`: git history and source pattern scans
//! - `DocAnalyst`: supplementary document depth and claimed paths
//! - `VisionInspector`: diagram assets
//!
//! Remote repositories are cloned independently by each node that needs a
//! working tree; clones are removed when the node finishes.

pub mod checkout;
pub mod doc;
pub mod repo;
pub mod scan;
pub mod vision;

pub use checkout::{CommitRecord, RepoCheckout};
pub use doc::DocAnalyst;
pub use repo::RepoInvestigator;
pub use vision::VisionInspector;
