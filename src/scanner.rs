use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error)]
#[error("[line {line}] scan error: {message}")]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

impl ScanError {
    fn new(line: usize, message: &str) -> ScanError {
        ScanError {
            line,
            message: String::from(message),
        }
    }
}

struct ScanPosition {
    start: usize,
    current: usize,
    line: usize,
}

pub struct Scanner {
    source_graphemes: Vec<String>,
    pos: ScanPosition,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
}

impl Scanner {
    pub fn new(source: &str) -> Scanner {
        let source_graphemes: Vec<String> = source.graphemes(true).map(String::from).collect();
        Scanner {
            source_graphemes,
            pos: ScanPosition {
                start: 0,
                current: 0,
                line: 1,
            },
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<ScanError>) {
        while !self.is_at_end() {
            self.pos.start = self.pos.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, String::new(), self.pos.line));
        (self.tokens, self.errors)
    }

    fn is_at_end(&self) -> bool {
        self.pos.current >= self.source_graphemes.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance().to_string();
        match c.as_str() {
            "(" => self.add_token(TokenKind::LeftParen),
            ")" => self.add_token(TokenKind::RightParen),
            "{" => self.add_token(TokenKind::LeftBrace),
            "}" => self.add_token(TokenKind::RightBrace),
            "," => self.add_token(TokenKind::Comma),
            "." => self.add_token(TokenKind::Dot),
            "-" => self.add_token(TokenKind::Minus),
            "+" => self.add_token(TokenKind::Plus),
            ";" => self.add_token(TokenKind::Semicolon),
            "*" => self.add_token(TokenKind::Star),
            "!" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind)
            }
            "=" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind)
            }
            "<" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind)
            }
            ">" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind)
            }
            "/" => {
                if self.advance_if_matched("/") {
                    // Line comment, runs to end of line.
                    while self.peek() != "\n" && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash)
                }
            }
            " " | "\r" | "\t" => {}
            "\n" => self.pos.line += 1,
            "\"" => self.string_literal(),
            c if is_digit(c) => self.number_literal(),
            c if is_alpha(c) => self.identifier(),
            c => self.errors.push(ScanError::new(
                self.pos.line,
                &format!("Unexpected character '{}'", c),
            )),
        }
    }

    fn advance(&mut self) -> &str {
        let s = &self.source_graphemes[self.pos.current];
        self.pos.current += 1;
        s
    }

    fn advance_if_matched(&mut self, expected: &str) -> bool {
        if self.is_at_end() || self.source_graphemes[self.pos.current] != expected {
            false
        } else {
            self.pos.current += 1;
            true
        }
    }

    fn peek(&self) -> &str {
        if self.is_at_end() {
            "\0"
        } else {
            &self.source_graphemes[self.pos.current]
        }
    }

    fn peek_next(&self) -> &str {
        if self.pos.current + 1 >= self.source_graphemes.len() {
            "\0"
        } else {
            &self.source_graphemes[self.pos.current + 1]
        }
    }

    fn current_lexeme(&self) -> String {
        self.source_graphemes[self.pos.start..self.pos.current].join("")
    }

    fn add_token(&mut self, kind: TokenKind) {
        let text = self.current_lexeme();
        self.tokens.push(Token::new(kind, text, self.pos.line))
    }

    fn string_literal(&mut self) {
        while self.peek() != "\"" && !self.is_at_end() {
            if self.peek() == "\n" {
                self.pos.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.errors
                .push(ScanError::new(self.pos.line, "Unterminated string."));
            return;
        }
        self.advance(); // The closing ".

        let value = self.source_graphemes[self.pos.start + 1..self.pos.current - 1].join("");
        self.add_token(TokenKind::String { literal: value })
    }

    fn number_literal(&mut self) {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == "." && is_digit(self.peek_next()) {
            self.advance(); // The '.'.
            while is_digit(self.peek()) {
                self.advance();
            }
        }

        let lexeme = self.current_lexeme();
        match lexeme.parse::<f64>() {
            Ok(literal) => self.add_token(TokenKind::Number { literal }),
            Err(_) => self.errors.push(ScanError::new(
                self.pos.line,
                &format!("Invalid number literal '{}'", lexeme),
            )),
        }
    }

    fn identifier(&mut self) {
        while is_alpha_numeric(self.peek()) {
            self.advance();
        }
        let kind = keyword_kind(&self.current_lexeme()).unwrap_or(TokenKind::Identifier);
        self.add_token(kind)
    }
}

fn keyword_kind(lexeme: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match lexeme {
        "and" => And,
        "class" => Class,
        "else" => Else,
        "false" => False,
        "fun" => Fun,
        "for" => For,
        "if" => If,
        "nil" => Nil,
        "or" => Or,
        "print" => Print,
        "return" => Return,
        "super" => Super,
        "this" => This,
        "true" => True,
        "var" => Var,
        "while" => While,
        _ => return None,
    };
    Some(kind)
}

fn is_digit(s: &str) -> bool {
    matches!(s.as_bytes(), [b'0'..=b'9'])
}

fn is_alpha(s: &str) -> bool {
    matches!(s.as_bytes(), [b'a'..=b'z'] | [b'A'..=b'Z'] | [b'_'])
}

fn is_alpha_numeric(s: &str) -> bool {
    is_digit(s) || is_alpha(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "unexpected scan errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_operators_and_punctuation() {
        use TokenKind::*;
        assert_eq!(
            scan("(){};,.-+*/! != = == > >= < <="),
            vec![
                LeftParen, RightParen, LeftBrace, RightBrace, Semicolon, Comma, Dot, Minus, Plus,
                Star, Slash, Bang, BangEqual, Equal, EqualEqual, Greater, GreaterEqual, Less,
                LessEqual, Eof
            ]
        );
    }

    #[test]
    fn scans_literals_and_keywords() {
        use TokenKind::*;
        assert_eq!(
            scan("var answer = 42.5; print \"hi\";"),
            vec![
                Var,
                Identifier,
                Equal,
                Number { literal: 42.5 },
                Semicolon,
                Print,
                String {
                    literal: "hi".to_string()
                },
                Semicolon,
                Eof
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            scan("// nothing here\n1"),
            vec![TokenKind::Number { literal: 1.0 }, TokenKind::Eof]
        );
    }

    #[test]
    fn reports_unexpected_character_and_continues() {
        let (tokens, errors) = Scanner::new("@ 1").scan_tokens();
        assert_eq!(errors.len(), 1);
        assert_eq!(tokens.len(), 2); // the number and Eof
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, errors) = Scanner::new("\"open").scan_tokens();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn tracks_lines_inside_strings() {
        let (tokens, _) = Scanner::new("\"a\nb\"\nx").scan_tokens();
        assert_eq!(tokens[1].line, 3);
    }
}
