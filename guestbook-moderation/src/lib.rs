pub mod chain;
pub mod classifier;
pub mod wordlist;

pub use chain::{FailureMode, ModerationChain, ModerationInput, RejectReason, Verdict};
pub use classifier::ClassifierClient;
pub use wordlist::{LexicalFilter, WordlistSource};
