//! Write operations: request encoding, submission, and cache invalidation.

pub mod controller;
pub mod encoding;

pub use controller::{Mutation, MutationController, MutationRequest, MutationState};
pub use encoding::{
    encode, Attachment, EncodedBody, EncodingTable, FieldEncoding, FieldSpec, FieldValue, Part,
    PartContent, Payload,
};
