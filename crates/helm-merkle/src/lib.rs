//! Merkle tree over CSNF documents and selective-disclosure evidence
//! views.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod tree;
mod view;

pub use error::MerkleError;
pub use error::Result;
pub use tree::Hash;
pub use tree::InclusionProof;
pub use tree::MerkleTree;
pub use tree::Side;
pub use tree::verify;
pub use view::Action;
pub use view::EvidenceView;
pub use view::SealedLeaf;
pub use view::ViewRule;
pub use view::VerifyOptions;
pub use view::WireInclusionProof;
pub use view::derive_view;
pub use view::verify_view;
