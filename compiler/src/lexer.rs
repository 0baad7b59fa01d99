// Lexer for P4 source files.
//
// Tokenizes the supported P4-14 subset. Uses the `logos` crate for
// DFA-based lexing. The preprocessor runs before the lexer, so no `#`
// directives reach this layer.
//
// Preconditions: input is valid UTF-8 with preprocessor directives expanded.
// Postconditions: returns all tokens with byte-offset spans, plus any lex
//   errors.
// Failure modes: unrecognized characters produce `LexError`; lexing
//   continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// P4 token types.
///
/// Keywords and symbols are matched as fixed strings. Number literals carry
/// parsed values. Identifiers carry no value — use the span to retrieve the
/// text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*|/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token {
    // ── Keywords ──
    #[token("header_type")]
    HeaderType,
    #[token("header")]
    Header,
    #[token("metadata")]
    Metadata,
    #[token("fields")]
    Fields,
    #[token("parser")]
    Parser,
    #[token("extract")]
    Extract,
    #[token("set_metadata")]
    SetMetadata,
    #[token("return")]
    Return,
    #[token("select")]
    Select,
    #[token("default")]
    Default,
    #[token("action")]
    Action,
    #[token("table")]
    Table,
    #[token("reads")]
    Reads,
    #[token("actions")]
    Actions,
    #[token("size")]
    Size,
    #[token("control")]
    Control,
    #[token("apply")]
    Apply,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("valid")]
    Valid,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // ── Symbols ──
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // ── Literals ──
    //
    // The hex regex must appear before the decimal one so `0x1f` lexes as
    // one hex literal rather than `0` followed by an identifier.
    /// Integer literal, decimal or hex.
    #[regex(r"0[xX][0-9a-fA-F]+", parse_hex)]
    #[regex(r"[0-9]+", parse_dec)]
    Number(u64),

    // ── Identifier ──
    //
    // Placed after keywords — logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `table` matches Table, not Ident.
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`. Field references are composed
    /// in the parser from `Ident Dot Ident`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::HeaderType => write!(f, "header_type"),
            Token::Header => write!(f, "header"),
            Token::Metadata => write!(f, "metadata"),
            Token::Fields => write!(f, "fields"),
            Token::Parser => write!(f, "parser"),
            Token::Extract => write!(f, "extract"),
            Token::SetMetadata => write!(f, "set_metadata"),
            Token::Return => write!(f, "return"),
            Token::Select => write!(f, "select"),
            Token::Default => write!(f, "default"),
            Token::Action => write!(f, "action"),
            Token::Table => write!(f, "table"),
            Token::Reads => write!(f, "reads"),
            Token::Actions => write!(f, "actions"),
            Token::Size => write!(f, "size"),
            Token::Control => write!(f, "control"),
            Token::Apply => write!(f, "apply"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::Valid => write!(f, "valid"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Semi => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_dec(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    lex.slice().parse().ok()
}

fn parse_hex(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    u64::from_str_radix(&lex.slice()[2..], 16).ok()
}

// ── Public API ──

/// Lex a P4 source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!(
                    "unrecognized character(s) '{}'",
                    &source[range.start..range.end]
                ),
            }),
        }
    }

    LexResult { tokens, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(result.errors.is_empty(), "lex errors: {:?}", result.errors);
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_over_idents() {
        let toks = tokens_of("table tab");
        assert_eq!(toks, vec![Token::Table, Token::Ident]);
    }

    #[test]
    fn hex_and_decimal_numbers() {
        let toks = tokens_of("0x800 2048");
        assert_eq!(toks, vec![Token::Number(0x800), Token::Number(2048)]);
    }

    #[test]
    fn field_reference_tokens() {
        let toks = tokens_of("ethernet.dstAddr");
        assert_eq!(toks, vec![Token::Ident, Token::Dot, Token::Ident]);
    }

    #[test]
    fn comparison_operators() {
        let toks = tokens_of("== != <= >= < >");
        assert_eq!(
            toks,
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::Lt,
                Token::Gt
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        let toks = tokens_of("table // trailing\n/* block\n * comment */ t");
        assert_eq!(toks, vec![Token::Table, Token::Ident]);
    }

    #[test]
    fn bad_character_reported() {
        let result = lex("table %");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains('%'));
        assert_eq!(result.tokens.len(), 1);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("if valid");
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 2 });
        assert_eq!(result.tokens[1].1, Span { start: 3, end: 8 });
    }
}
