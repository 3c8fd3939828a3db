//! The DAIDE token language.
//!
//! A DAIDE message is a flat sequence of 16-bit tokens forming a balanced
//! bracketed structure. `lexicon` defines the token encoding and the full
//! token catalogue, `message` the bracketed message type, and `text` the
//! token-to-text dictionary used for the human-readable form.

pub mod lexicon;
pub mod message;
pub mod text;

pub use lexicon::Token;
pub use message::TokenMessage;
pub use text::TokenDictionary;
