//! In-memory test doubles for the two remote collaborators.
//!
//! `MockHosting` serves a repository tree from a map of paths and records
//! every call; `MockCompletion` answers prompts from canned replies.

mod mock;

pub use mock::{MockCall, MockCompletion, MockFailure, MockHosting, MockReply};
