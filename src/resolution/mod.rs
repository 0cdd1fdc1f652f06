pub mod file_resolver;
pub mod fuzzy;

pub use file_resolver::{FileMatch, FileResolver, MatchMethod};
pub use fuzzy::{CodeBlockCandidate, FuzzyResolver, ResolutionMethod, ResolutionResult};
