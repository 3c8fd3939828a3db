//! Token-to-text dictionary and the textual message form.
//!
//! Every token has a short mnemonic ("HLD", "NTH", ...). ASCII literal runs
//! are delimited by apostrophes with `''` escaping a single quote, and
//! numbers are written in decimal. The dictionary starts from the standard
//! catalogue and is updated per session: a representation message replaces
//! the power and province categories for non-standard maps.

use std::collections::{BTreeMap, HashMap};

use super::lexicon::{self, Token};
use super::message::TokenMessage;

/// Failure while parsing the textual form of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// A character that cannot start a token, a stray close bracket, or an
    /// unterminated quote, at the given byte offset.
    #[error("bad character at byte {0}")]
    BadCharacter(usize),

    /// A three-letter mnemonic with no dictionary entry.
    #[error("unknown token at byte {0}")]
    UnknownToken(usize),
}

/// Bidirectional token/mnemonic dictionary.
#[derive(Debug, Clone)]
pub struct TokenDictionary {
    to_text: BTreeMap<u16, String>,
    to_token: HashMap<String, Token>,
}

impl TokenDictionary {
    /// Adds an entry. Returns false if either the token or the text is
    /// already mapped.
    pub fn insert(&mut self, token: Token, text: &str) -> bool {
        if self.to_text.contains_key(&token.raw()) || self.to_token.contains_key(text) {
            return false;
        }
        self.to_text.insert(token.raw(), text.to_string());
        self.to_token.insert(text.to_string(), token);
        true
    }

    /// Removes every entry in one category.
    pub fn clear_category(&mut self, category: u8) {
        let low = (category as u16) << 8;
        let high = low | 0x00FF;
        let removed: Vec<u16> = self.to_text.range(low..=high).map(|(&raw, _)| raw).collect();
        for raw in removed {
            if let Some(text) = self.to_text.remove(&raw) {
                self.to_token.remove(&text);
            }
        }
    }

    /// Removes the power category and all province categories, ready for a
    /// representation message to repopulate them.
    pub fn clear_powers_and_provinces(&mut self) {
        self.clear_category(lexicon::CATEGORY_POWER);
        for category in lexicon::CATEGORY_PROVINCE_MIN..=lexicon::CATEGORY_PROVINCE_MAX {
            self.clear_category(category);
        }
    }

    /// Looks up the token for a mnemonic.
    pub fn token_for(&self, text: &str) -> Option<Token> {
        self.to_token.get(text).copied()
    }

    /// Looks up the mnemonic for a token.
    pub fn text_for(&self, token: Token) -> Option<&str> {
        self.to_text.get(&token.raw()).map(String::as_str)
    }

    /// Parses the textual form of a message.
    pub fn parse_message(&self, text: &str) -> Result<TokenMessage, TextError> {
        let bytes = text.as_bytes();
        let mut tokens: Vec<Token> = Vec::new();
        let mut offset = 0usize;
        let mut depth = 0i32;

        while offset < bytes.len() {
            let ch = bytes[offset];
            if ch == b' ' {
                offset += 1;
            } else if ch == b'(' {
                tokens.push(lexicon::OPEN_BRACKET);
                depth += 1;
                offset += 1;
            } else if ch == b')' {
                depth -= 1;
                if depth < 0 {
                    return Err(TextError::BadCharacter(offset));
                }
                tokens.push(lexicon::CLOSE_BRACKET);
                offset += 1;
            } else if ch == b'\'' {
                offset += 1;
                // A quote directly after an ASCII run is an escaped quote.
                if tokens
                    .last()
                    .is_some_and(|t| t.category() == lexicon::CATEGORY_ASCII)
                {
                    tokens.push(Token::new(lexicon::CATEGORY_ASCII, b'\''));
                }
                while offset < bytes.len() && bytes[offset] != b'\'' {
                    tokens.push(Token::new(lexicon::CATEGORY_ASCII, bytes[offset]));
                    offset += 1;
                }
                if offset >= bytes.len() {
                    return Err(TextError::BadCharacter(offset));
                }
                offset += 1;
            } else if ch.is_ascii_alphabetic() {
                if offset + 3 > bytes.len() {
                    return Err(TextError::UnknownToken(offset));
                }
                let mnemonic: String = bytes[offset..offset + 3]
                    .iter()
                    .map(|b| b.to_ascii_uppercase() as char)
                    .collect();
                match self.token_for(&mnemonic) {
                    Some(token) => tokens.push(token),
                    None => return Err(TextError::UnknownToken(offset)),
                }
                offset += 3;
            } else if ch.is_ascii_digit() || ch == b'-' {
                let negative = ch == b'-';
                if negative {
                    offset += 1;
                }
                let mut value: i32 = 0;
                while offset < bytes.len() && bytes[offset].is_ascii_digit() {
                    value = value * 10 + (bytes[offset] - b'0') as i32;
                    offset += 1;
                }
                if negative {
                    value = -value;
                }
                tokens.push(Token::number(value));
            } else {
                return Err(TextError::BadCharacter(offset));
            }
        }

        if depth != 0 {
            return Err(TextError::BadCharacter(bytes.len()));
        }
        TokenMessage::from_tokens(&tokens).map_err(|e| TextError::BadCharacter(e.0))
    }

    /// Renders a message in its textual form. Tokens missing from the
    /// dictionary render as "???".
    pub fn render_message(&self, message: &TokenMessage) -> String {
        let mut text = String::new();
        let mut in_ascii = false;

        for &token in message.tokens() {
            let is_ascii = token.category() == lexicon::CATEGORY_ASCII;
            if in_ascii && !is_ascii {
                text.push_str("' ");
                in_ascii = false;
            }
            if !in_ascii && is_ascii {
                text.push('\'');
                in_ascii = true;
            }

            if is_ascii {
                let ch = token.subtoken() as char;
                if ch == '\'' {
                    text.push_str("''");
                } else {
                    text.push(ch);
                }
            } else if token.is_number() {
                text.push_str(&token.number_value().to_string());
                text.push(' ');
            } else {
                match self.text_for(token) {
                    Some(name) => {
                        text.push_str(name);
                        text.push(' ');
                    }
                    None => text.push_str("??? "),
                }
            }
        }

        if in_ascii {
            text.push_str("' ");
        }
        text
    }
}

/// Builds a message consisting purely of ASCII-category tokens.
pub fn ascii_message(text: &str) -> TokenMessage {
    let tokens: Vec<Token> = text
        .bytes()
        .map(|b| Token::new(lexicon::CATEGORY_ASCII, b))
        .collect();
    TokenMessage::from_tokens(&tokens).unwrap_or_default()
}

/// Collects the ASCII-category tokens of a message back into a string.
pub fn ascii_run_string(message: &TokenMessage) -> String {
    message
        .tokens()
        .iter()
        .filter(|t| t.category() == lexicon::CATEGORY_ASCII)
        .map(|t| t.subtoken() as char)
        .collect()
}

impl Default for TokenDictionary {
    fn default() -> TokenDictionary {
        use lexicon::*;

        let mut dict = TokenDictionary {
            to_text: BTreeMap::new(),
            to_token: HashMap::new(),
        };
        let entries: &[(Token, &str)] = &[
            (OPEN_BRACKET, "("),
            (CLOSE_BRACKET, ")"),
            (AUS, "AUS"),
            (ENG, "ENG"),
            (FRA, "FRA"),
            (GER, "GER"),
            (ITA, "ITA"),
            (RUS, "RUS"),
            (TUR, "TUR"),
            (AMY, "AMY"),
            (FLT, "FLT"),
            (CTO, "CTO"),
            (CVY, "CVY"),
            (HLD, "HLD"),
            (MTO, "MTO"),
            (SUP, "SUP"),
            (VIA, "VIA"),
            (DSB, "DSB"),
            (RTO, "RTO"),
            (BLD, "BLD"),
            (REM, "REM"),
            (WVE, "WVE"),
            (MBV, "MBV"),
            (BPR, "BPR"),
            (CST, "CST"),
            (ESC, "ESC"),
            (FAR, "FAR"),
            (HSC, "HSC"),
            (NAS, "NAS"),
            (NMB, "NMB"),
            (NMR, "NMR"),
            (NRN, "NRN"),
            (NRS, "NRS"),
            (NSA, "NSA"),
            (NSC, "NSC"),
            (NSF, "NSF"),
            (NSP, "NSP"),
            (NSU, "NSU"),
            (NVR, "NVR"),
            (NYU, "NYU"),
            (YSC, "YSC"),
            (SUC, "SUC"),
            (BNC, "BNC"),
            (CUT, "CUT"),
            (DSR, "DSR"),
            (FLD, "FLD"),
            (NSO, "NSO"),
            (RET, "RET"),
            (NCS, "NCS"),
            (ECS, "ECS"),
            (SCS, "SCS"),
            (WCS, "WCS"),
            (SPR, "SPR"),
            (SUM, "SUM"),
            (FAL, "FAL"),
            (AUT, "AUT"),
            (WIN, "WIN"),
            (CCD, "CCD"),
            (DRW, "DRW"),
            (FRM, "FRM"),
            (GOF, "GOF"),
            (HLO, "HLO"),
            (HST, "HST"),
            (HUH, "HUH"),
            (IAM, "IAM"),
            (LOD, "LOD"),
            (MAP, "MAP"),
            (MDF, "MDF"),
            (MIS, "MIS"),
            (NME, "NME"),
            (NOT, "NOT"),
            (NOW, "NOW"),
            (OBS, "OBS"),
            (OFF, "OFF"),
            (ORD, "ORD"),
            (OUT, "OUT"),
            (PRN, "PRN"),
            (REJ, "REJ"),
            (SCO, "SCO"),
            (SLO, "SLO"),
            (SND, "SND"),
            (SUB, "SUB"),
            (SVE, "SVE"),
            (THX, "THX"),
            (TME, "TME"),
            (YES, "YES"),
            (ADM, "ADM"),
            (SMR, "SMR"),
            (AOA, "AOA"),
            (BTL, "BTL"),
            (ERR, "ERR"),
            (LVL, "LVL"),
            (MRT, "MRT"),
            (MTL, "MTL"),
            (NPB, "NPB"),
            (NPR, "NPR"),
            (PDA, "PDA"),
            (PTL, "PTL"),
            (RTL, "RTL"),
            (UNO, "UNO"),
            (DSD, "DSD"),
            (ALY, "ALY"),
            (AND, "AND"),
            (BWX, "BWX"),
            (DMZ, "DMZ"),
            (ELS, "ELS"),
            (EXP, "EXP"),
            (FCT, "FCT"),
            (FOR, "FOR"),
            (FWD, "FWD"),
            (HOW, "HOW"),
            (IDK, "IDK"),
            (IFF, "IFF"),
            (INS, "INS"),
            (OCC, "OCC"),
            (ORR, "ORR"),
            (PCE, "PCE"),
            (POB, "POB"),
            (PRP, "PRP"),
            (QRY, "QRY"),
            (SCD, "SCD"),
            (SRY, "SRY"),
            (SUG, "SUG"),
            (THK, "THK"),
            (THN, "THN"),
            (TRY, "TRY"),
            (VSS, "VSS"),
            (WHT, "WHT"),
            (WHY, "WHY"),
            (XDO, "XDO"),
            (XOY, "XOY"),
            (YDO, "YDO"),
            (CHO, "CHO"),
            (BCC, "BCC"),
            (UNT, "UNT"),
            (BOH, "BOH"),
            (BUR, "BUR"),
            (GAL, "GAL"),
            (RUH, "RUH"),
            (SIL, "SIL"),
            (TYR, "TYR"),
            (UKR, "UKR"),
            (BUD, "BUD"),
            (MOS, "MOS"),
            (MUN, "MUN"),
            (PAR, "PAR"),
            (SER, "SER"),
            (VIE, "VIE"),
            (WAR, "WAR"),
            (ADR, "ADR"),
            (AEG, "AEG"),
            (BAL, "BAL"),
            (BAR, "BAR"),
            (BLA, "BLA"),
            (EAS, "EAS"),
            (ECH, "ECH"),
            (GOB, "GOB"),
            (GOL, "GOL"),
            (HEL, "HEL"),
            (ION, "ION"),
            (IRI, "IRI"),
            (MAO, "MAO"),
            (NAO, "NAO"),
            (NTH, "NTH"),
            (NWG, "NWG"),
            (SKA, "SKA"),
            (TYS, "TYS"),
            (WES, "WES"),
            (ALB, "ALB"),
            (APU, "APU"),
            (ARM, "ARM"),
            (CLY, "CLY"),
            (FIN, "FIN"),
        ];
        for &(token, text) in entries {
            dict.insert(token, text);
        }
        // The remaining coastal and split-coast provinces.
        let provinces: &[(Token, &str)] = &[
            (GAS, "GAS"),
            (LVN, "LVN"),
            (NAF, "NAF"),
            (PIC, "PIC"),
            (PIE, "PIE"),
            (PRU, "PRU"),
            (SYR, "SYR"),
            (TUS, "TUS"),
            (WAL, "WAL"),
            (YOR, "YOR"),
            (ANK, "ANK"),
            (BEL, "BEL"),
            (BER, "BER"),
            (BRE, "BRE"),
            (CON, "CON"),
            (DEN, "DEN"),
            (EDI, "EDI"),
            (GRE, "GRE"),
            (HOL, "HOL"),
            (KIE, "KIE"),
            (LON, "LON"),
            (LVP, "LVP"),
            (MAR, "MAR"),
            (NAP, "NAP"),
            (NWY, "NWY"),
            (POR, "POR"),
            (ROM, "ROM"),
            (RUM, "RUM"),
            (SEV, "SEV"),
            (SMY, "SMY"),
            (SWE, "SWE"),
        ];
        for &(token, text) in provinces {
            dict.insert(token, text);
        }
        let provinces_tail: &[(Token, &str)] = &[
            (TRI, "TRI"),
            (TUN, "TUN"),
            (VEN, "VEN"),
            (BUL, "BUL"),
            (SPA, "SPA"),
            (STP, "STP"),
        ];
        for &(token, text) in provinces_tail {
            dict.insert(token, text);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexicon::*;

    fn dict() -> TokenDictionary {
        TokenDictionary::default()
    }

    #[test]
    fn parse_simple_command() {
        let msg = dict().parse_message("YES ( MAP )").unwrap();
        assert_eq!(msg.tokens(), &[YES, OPEN_BRACKET, MAP, CLOSE_BRACKET]);
    }

    #[test]
    fn parse_without_spaces() {
        let msg = dict().parse_message("YES(MAP)").unwrap();
        assert_eq!(msg.tokens(), &[YES, OPEN_BRACKET, MAP, CLOSE_BRACKET]);
    }

    #[test]
    fn parse_numbers() {
        let msg = dict().parse_message("SPR 1901").unwrap();
        assert_eq!(msg.token(0), SPR);
        assert_eq!(msg.token(1).number_value(), 1901);

        let msg = dict().parse_message("-42").unwrap();
        assert_eq!(msg.token(0).number_value(), -42);
    }

    #[test]
    fn parse_ascii_literal() {
        let msg = dict().parse_message("NME ('holdbot') ('1')").unwrap();
        assert_eq!(msg.submessage_count(), 3);
        assert_eq!(ascii_run_string(&msg.submessage(1)), "holdbot");
    }

    #[test]
    fn parse_escaped_quote() {
        let msg = dict().parse_message("'it''s'").unwrap();
        assert_eq!(ascii_run_string(&msg), "it's");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            dict().parse_message("YES ("),
            Err(TextError::BadCharacter(5))
        );
        assert_eq!(
            dict().parse_message(") YES"),
            Err(TextError::BadCharacter(0))
        );
        assert_eq!(
            dict().parse_message("QQQ"),
            Err(TextError::UnknownToken(0))
        );
        assert_eq!(
            dict().parse_message("YES $"),
            Err(TextError::BadCharacter(4))
        );
        assert_eq!(
            dict().parse_message("'open"),
            Err(TextError::BadCharacter(5))
        );
    }

    #[test]
    fn render_roundtrip() {
        let dict = dict();
        let samples = [
            "YES ( MAP ( 'standard' ) ) ",
            "SUB ( ( ENG FLT LON ) MTO NTH ) ",
            "NOW ( SPR 1901 ) ( RUS FLT ( STP SCS ) ) ",
            "HLO ( FRA ) ( 1234 ) ( ( LVL 0 ) ) ",
            "-8192 8191 0 ",
        ];
        for sample in samples {
            let msg = dict.parse_message(sample).unwrap();
            let rendered = dict.render_message(&msg);
            assert_eq!(dict.parse_message(&rendered).unwrap(), msg, "{sample}");
        }
    }

    #[test]
    fn render_unknown_token() {
        let dict = dict();
        let msg = TokenMessage::single(Token::from_raw(0x5FFE));
        assert_eq!(dict.render_message(&msg), "??? ");
    }

    #[test]
    fn representation_update_replaces_provinces() {
        let mut dict = dict();
        dict.clear_powers_and_provinces();
        assert_eq!(dict.token_for("LON"), None);
        assert_eq!(dict.token_for("ENG"), None);
        // Order verbs survive.
        assert_eq!(dict.token_for("HLD"), Some(HLD));

        assert!(dict.insert(Token::new(0x50, 0x00), "ZZA"));
        assert_eq!(dict.token_for("ZZA"), Some(Token::new(0x50, 0x00)));
        // Duplicate insertion is rejected.
        assert!(!dict.insert(Token::new(0x50, 0x00), "ZZB"));
        assert!(!dict.insert(Token::new(0x50, 0x01), "ZZA"));
    }

    #[test]
    fn ascii_message_roundtrip() {
        let msg = ascii_message("standard");
        assert_eq!(msg.len(), 8);
        assert_eq!(ascii_run_string(&msg), "standard");
    }
}
