pub mod execution;
pub mod notes;
pub mod search;

pub use execution::{interpret_result, ExecutionClient};
pub use notes::NoteStore;
pub use search::SearchClient;
