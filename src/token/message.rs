//! Bracketed token messages.
//!
//! A `TokenMessage` is an ordered token sequence with matched brackets.
//! Top-level submessages are either a single token or a bracketed group;
//! their start offsets are recorded when the message is built so that
//! submessage extraction is cheap.
//!
//! Concatenation mirrors the DAIDE conventions: `a + b` appends the tokens
//! of `b` verbatim, `a & b` appends `b` enclosed in its own bracket pair.

use std::ops::{Add, BitAnd};

use super::lexicon::{self, Token};

/// Sentinel returned for out-of-range token reads. Lives in the range the
/// protocol reserves for tokens local to a machine.
pub const END_OF_MESSAGE: Token = Token::from_raw(0x5FFF);

/// Brackets were not balanced; the payload is the offending token offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mismatched brackets at token offset {0}")]
pub struct BracketMismatch(pub usize);

/// An ordered, bracket-balanced sequence of tokens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenMessage {
    tokens: Vec<Token>,
    /// Start offset of each top-level submessage, plus a final sentinel
    /// equal to the message length.
    starts: Vec<usize>,
}

impl Default for TokenMessage {
    fn default() -> TokenMessage {
        TokenMessage {
            tokens: Vec::new(),
            starts: vec![0],
        }
    }
}

/// Computes submessage start offsets for a known-balanced token sequence.
fn submessage_starts(tokens: &[Token]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0usize;
    for (offset, &token) in tokens.iter().enumerate() {
        if depth == 0 {
            starts.push(offset);
        }
        if token == lexicon::OPEN_BRACKET {
            depth += 1;
        } else if token == lexicon::CLOSE_BRACKET {
            depth -= 1;
        }
    }
    starts.push(tokens.len());
    starts
}

impl TokenMessage {
    /// Creates an empty message.
    pub fn new() -> TokenMessage {
        TokenMessage::default()
    }

    /// Creates a message holding a single token.
    pub fn single(token: Token) -> TokenMessage {
        TokenMessage {
            tokens: vec![token],
            starts: vec![0, 1],
        }
    }

    /// Builds a message from raw tokens, checking bracket balance.
    pub fn from_tokens(tokens: &[Token]) -> Result<TokenMessage, BracketMismatch> {
        let mut depth = 0i32;
        for (offset, &token) in tokens.iter().enumerate() {
            if token == lexicon::OPEN_BRACKET {
                depth += 1;
            } else if token == lexicon::CLOSE_BRACKET {
                depth -= 1;
                if depth < 0 {
                    return Err(BracketMismatch(offset));
                }
            }
        }
        if depth != 0 {
            return Err(BracketMismatch(tokens.len()));
        }
        Ok(TokenMessage::from_valid(tokens.to_vec()))
    }

    /// Builds a message from tokens already known to be balanced.
    fn from_valid(tokens: Vec<Token>) -> TokenMessage {
        let starts = submessage_starts(&tokens);
        TokenMessage { tokens, starts }
    }

    /// Number of tokens in the message.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true for the empty message.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns true if the whole message is one token.
    pub fn is_single_token(&self) -> bool {
        self.tokens.len() == 1
    }

    /// Returns true if any submessage is bracketed.
    pub fn contains_submessages(&self) -> bool {
        self.submessage_count() != self.tokens.len()
    }

    /// The raw token slice.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The first token, or `END_OF_MESSAGE` when empty.
    pub fn first(&self) -> Token {
        self.token(0)
    }

    /// The token at `index`, or `END_OF_MESSAGE` when out of range.
    pub fn token(&self, index: usize) -> Token {
        self.tokens.get(index).copied().unwrap_or(END_OF_MESSAGE)
    }

    /// Number of top-level submessages.
    pub fn submessage_count(&self) -> usize {
        self.starts.len() - 1
    }

    /// Extracts a top-level submessage, stripping the outer brackets iff it
    /// is more than one token. Out-of-range indices yield an empty message.
    pub fn submessage(&self, index: usize) -> TokenMessage {
        if index >= self.submessage_count() {
            return TokenMessage::new();
        }
        let start = self.starts[index];
        let end = self.starts[index + 1];
        if end - start == 1 {
            TokenMessage::single(self.tokens[start])
        } else {
            TokenMessage::from_valid(self.tokens[start + 1..end - 1].to_vec())
        }
    }

    /// Offset of the first content token of submessage `index`: the token
    /// itself for a single token, the token after the bracket otherwise.
    pub fn submessage_start(&self, index: usize) -> usize {
        if index >= self.submessage_count() {
            return self.tokens.len();
        }
        let start = self.starts[index];
        if self.starts[index + 1] - start > 1 {
            start + 1
        } else {
            start
        }
    }

    /// Returns true if submessage `index` is exactly one token.
    pub fn submessage_is_single_token(&self, index: usize) -> bool {
        index < self.submessage_count() && self.starts[index + 1] - self.starts[index] == 1
    }

    /// Returns the message wrapped in one bracket pair.
    pub fn enclose(&self) -> TokenMessage {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 2);
        tokens.push(lexicon::OPEN_BRACKET);
        tokens.extend_from_slice(&self.tokens);
        tokens.push(lexicon::CLOSE_BRACKET);
        TokenMessage::from_valid(tokens)
    }
}

impl From<Token> for TokenMessage {
    fn from(token: Token) -> TokenMessage {
        TokenMessage::single(token)
    }
}

impl Add<TokenMessage> for TokenMessage {
    type Output = TokenMessage;

    fn add(self, other: TokenMessage) -> TokenMessage {
        let mut tokens = self.tokens;
        tokens.extend_from_slice(&other.tokens);
        TokenMessage::from_valid(tokens)
    }
}

impl Add<Token> for TokenMessage {
    type Output = TokenMessage;

    fn add(self, token: Token) -> TokenMessage {
        self + TokenMessage::single(token)
    }
}

impl BitAnd<TokenMessage> for TokenMessage {
    type Output = TokenMessage;

    /// Appends `other` as an enclosed submessage.
    fn bitand(self, other: TokenMessage) -> TokenMessage {
        self + other.enclose()
    }
}

impl BitAnd<Token> for TokenMessage {
    type Output = TokenMessage;

    fn bitand(self, token: Token) -> TokenMessage {
        self & TokenMessage::single(token)
    }
}

impl Add<Token> for Token {
    type Output = TokenMessage;

    fn add(self, other: Token) -> TokenMessage {
        TokenMessage::single(self) + other
    }
}

impl Add<TokenMessage> for Token {
    type Output = TokenMessage;

    fn add(self, other: TokenMessage) -> TokenMessage {
        TokenMessage::single(self) + other
    }
}

impl BitAnd<Token> for Token {
    type Output = TokenMessage;

    fn bitand(self, other: Token) -> TokenMessage {
        TokenMessage::single(self) & other
    }
}

impl BitAnd<TokenMessage> for Token {
    type Output = TokenMessage;

    fn bitand(self, other: TokenMessage) -> TokenMessage {
        TokenMessage::single(self) & other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexicon::*;

    #[test]
    fn empty_message() {
        let msg = TokenMessage::new();
        assert_eq!(msg.len(), 0);
        assert!(msg.is_empty());
        assert_eq!(msg.submessage_count(), 0);
        assert_eq!(msg.first(), END_OF_MESSAGE);
    }

    #[test]
    fn single_token_message() {
        let msg = TokenMessage::single(HLD);
        assert!(msg.is_single_token());
        assert!(!msg.contains_submessages());
        assert_eq!(msg.submessage_count(), 1);
        assert_eq!(msg.token(0), HLD);
        assert_eq!(msg.token(1), END_OF_MESSAGE);
    }

    #[test]
    fn bracket_validation() {
        let ok = [OPEN_BRACKET, AUS, CLOSE_BRACKET];
        assert!(TokenMessage::from_tokens(&ok).is_ok());

        let early_close = [CLOSE_BRACKET, OPEN_BRACKET];
        assert_eq!(
            TokenMessage::from_tokens(&early_close),
            Err(BracketMismatch(0))
        );

        let unclosed = [OPEN_BRACKET, AUS];
        assert_eq!(TokenMessage::from_tokens(&unclosed), Err(BracketMismatch(2)));
    }

    #[test]
    fn submessage_extraction() {
        // NOW (SPR 1901) (AUS AMY BUD)
        let msg = NOW + (SPR + Token::number(1901)).enclose() + (AUS + AMY + BUD).enclose();
        assert_eq!(msg.submessage_count(), 3);
        assert!(msg.submessage_is_single_token(0));
        assert_eq!(msg.submessage(0).first(), NOW);

        let turn = msg.submessage(1);
        assert_eq!(turn.len(), 2);
        assert_eq!(turn.token(0), SPR);
        assert_eq!(turn.token(1).number_value(), 1901);

        let unit = msg.submessage(2);
        assert_eq!(unit.tokens(), &[AUS, AMY, BUD]);
    }

    #[test]
    fn submessage_start_offsets() {
        let msg = NOW + (SPR + Token::number(1901)).enclose();
        assert_eq!(msg.submessage_start(0), 0);
        // The second submessage starts after its open bracket.
        assert_eq!(msg.submessage_start(1), 2);
    }

    #[test]
    fn single_token_submessage_is_not_unwrapped_twice() {
        // (AUS) — the submessage is bracketed but single-token inside.
        let msg = TokenMessage::single(AUS).enclose();
        assert_eq!(msg.submessage_count(), 1);
        assert_eq!(msg.submessage(0).tokens(), &[AUS]);
    }

    #[test]
    fn concatenation_flat_and_enclosed() {
        let flat = YES + MAP;
        assert_eq!(flat.tokens(), &[YES, MAP]);

        let enclosed = YES & MAP;
        assert_eq!(enclosed.tokens(), &[YES, OPEN_BRACKET, MAP, CLOSE_BRACKET]);

        let nested = YES & (MAP & TokenMessage::new());
        assert_eq!(
            nested.tokens(),
            &[
                YES,
                OPEN_BRACKET,
                MAP,
                OPEN_BRACKET,
                CLOSE_BRACKET,
                CLOSE_BRACKET
            ]
        );
    }

    #[test]
    fn enclose_empty() {
        let msg = TokenMessage::new().enclose();
        assert_eq!(msg.tokens(), &[OPEN_BRACKET, CLOSE_BRACKET]);
        assert_eq!(msg.submessage_count(), 1);
        assert_eq!(msg.submessage(0).len(), 0);
    }

    #[test]
    fn equality_and_ordering() {
        let a = AUS + ENG;
        let b = AUS + ENG;
        let c = AUS + FRA;
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
        // A prefix orders before its extension.
        let short = TokenMessage::single(AUS);
        assert!(short < a);
    }
}
