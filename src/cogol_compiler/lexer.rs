// Cogol Lexer
// Splits lowercased source text into plain string tokens

use crate::cogol_compiler::error::{Diagnostic, DiagnosticKind};
use std::collections::VecDeque;

/// Always a token on their own
const SINGLETONS: &str = ",.:;{}()[]$\\";
/// Runs of these merge into one operator token, e.g. `<=` or `>>>`
const REPEATABLES: &str = "<>&|!=+^*";
const FORBIDDEN: &str = "~`@%/'";

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    current_char: Option<char>,
    current: String,
    tokens: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.to_lowercase().chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            line: 1,
            current_char,
            current: String::new(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (TokenStream, Vec<Diagnostic>) {
        while let Some(ch) = self.current_char {
            self.lex_char(ch);
            self.advance();
        }
        self.flush();

        log::debug!("Lexer produced {} tokens", self.tokens.len());
        (TokenStream::new(self.tokens), self.diagnostics)
    }

    fn lex_char(&mut self, ch: char) {
        match ch {
            '#' => {
                self.flush();
                self.skip_line_comment();
            }
            '"' => {
                self.flush();
                self.read_quoted();
            }
            '-' => {
                self.flush();
                match self.tokens.last_mut() {
                    Some(last) if last.ends_with('-') || last.ends_with('+') => last.push('-'),
                    _ => self.tokens.push("-".to_string()),
                }
            }
            c if c.is_whitespace() => self.flush(),
            c if SINGLETONS.contains(c) => {
                self.flush();
                self.tokens.push(c.to_string());
            }
            c if REPEATABLES.contains(c) => {
                self.flush();
                match self.tokens.last_mut() {
                    Some(last) if last.chars().last().is_some_and(is_operator_char) => last.push(c),
                    _ => self.tokens.push(c.to_string()),
                }
            }
            c if FORBIDDEN.contains(c) => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ForbiddenCharacter,
                    format!("forbidden character '{}'", c),
                    format!("line {}", self.line),
                ));
            }
            c => {
                if c.is_ascii_digit() && self.current.is_empty() && self.minus_is_unary() {
                    self.tokens.pop();
                    self.current.push('-');
                }
                self.current.push(c);
            }
        }
    }

    /// True when the last token is a lone `-` that cannot be a binary minus
    fn minus_is_unary(&self) -> bool {
        let count = self.tokens.len();
        if count == 0 || self.tokens[count - 1] != "-" {
            return false;
        }
        match count.checked_sub(2).map(|i| self.tokens[i].as_str()) {
            None => true,
            Some("(" | "[" | "," | ";" | "{" | "}") => true,
            Some(previous) => previous.chars().last().is_some_and(is_operator_char),
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.tokens.push(std::mem::take(&mut self.current));
        }
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char {
            self.line += 1;
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Reads up to the closing quote or the end of the line; the whole run is one token.
    fn read_quoted(&mut self) {
        let mut value = String::new();
        self.advance();
        while let Some(ch) = self.current_char {
            if ch == '"' || ch == '\n' {
                break;
            }
            value.push(ch);
            self.advance();
        }
        self.tokens.push(value);
    }
}

fn is_operator_char(c: char) -> bool {
    c == '-' || REPEATABLES.contains(c)
}

/// Token queue consumed front to back by the code generator.
///
/// Reading past the end yields empty strings rather than failing, so every
/// statement handler sees a well-defined (and never matching) token at EOF.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: VecDeque<String>,
}

impl TokenStream {
    pub fn new(tokens: Vec<String>) -> Self {
        TokenStream {
            tokens: tokens.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn peek(&self) -> &str {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> &str {
        self.tokens.get(n).map(String::as_str).unwrap_or("")
    }

    pub fn pop(&mut self) -> String {
        self.tokens.pop_front().unwrap_or_default()
    }

    /// Pops the next token if it is `expected`
    pub fn eat(&mut self, expected: &str) -> bool {
        if self.peek() == expected {
            self.tokens.pop_front();
            true
        } else {
            false
        }
    }

    /// Removes tokens up to and including the first one in `terminators`
    pub fn remove_through(&mut self, terminators: &[&str]) -> Vec<String> {
        let mut removed = Vec::new();
        while let Some(token) = self.tokens.pop_front() {
            let done = terminators.contains(&token.as_str());
            removed.push(token);
            if done {
                break;
            }
        }
        removed
    }

    /// Removes the rest of the current statement, including its `;`
    pub fn remove_statement(&mut self) -> Vec<String> {
        self.remove_through(&[";"])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}
