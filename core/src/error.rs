use thiserror::Error;

use crate::node::NodeId;

/// Fatal model-text problems. Anything here aborts the parse; no partial
/// graph is ever simulated.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("line {line}: unknown node type `{kind}`")]
    UnknownNodeType { line: usize, kind: String },

    #[error("line {line}: malformed node definition: {reason}")]
    MalformedNode { line: usize, reason: String },

    #[error("line {line}: malformed connection `{text}`")]
    MalformedConnection { line: usize, text: String },

    #[error("line {line}: connection references undefined node {id}")]
    DanglingConnection { line: usize, id: NodeId },

    #[error("model defines no nodes")]
    EmptyModel,
}
