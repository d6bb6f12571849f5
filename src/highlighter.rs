// ABOUTME: Syntax highlighter for the REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for Monkey syntax elements while preserving display width

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;
use std::collections::HashSet;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_BUILTIN: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_DELIMITER: &str = "\x1b[1;34m"; // Bold blue

/// Main highlighter helper for the Monkey REPL
pub struct MonkeyHelper;

impl MonkeyHelper {
    pub fn new() -> Self {
        MonkeyHelper
    }
}

impl Default for MonkeyHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for MonkeyHelper {}

impl Completer for MonkeyHelper {
    type Candidate = String;
}

impl Hinter for MonkeyHelper {
    type Hint = String;
}

impl Validator for MonkeyHelper {}

impl Highlighter for MonkeyHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let keywords = keywords();
        let builtins = builtins();

        let highlighted = highlight_line(line, &keywords, &builtins);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Tokenize a line and apply syntax highlighting
fn highlight_line(
    line: &str,
    keywords: &HashSet<&'static str>,
    builtins: &HashSet<&'static str>,
) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Strings: no escapes in Monkey, runs to the next quote
            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    result.push(ch);
                    i += 1;
                    if ch == '"' {
                        break;
                    }
                }
                result.push_str(COLOR_RESET);
            }

            // Integer literals
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let number: String = chars[start..i].iter().collect();
                result.push_str(COLOR_NUMBER);
                result.push_str(&number);
                result.push_str(COLOR_RESET);
            }

            // Delimiters
            '(' | ')' | '[' | ']' | '{' | '}' => {
                result.push_str(COLOR_DELIMITER);
                result.push(chars[i]);
                i += 1;
                result.push_str(COLOR_RESET);
            }

            // Identifiers and keywords
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if keywords.contains(word.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else if builtins.contains(word.as_str()) {
                    result.push_str(COLOR_BUILTIN);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }

            // Operators, punctuation, whitespace
            _ => {
                result.push(chars[i]);
                i += 1;
            }
        }
    }

    result
}

fn keywords() -> HashSet<&'static str> {
    ["fn", "let", "true", "false", "if", "else", "return", "macro"]
        .iter()
        .copied()
        .collect()
}

fn builtins() -> HashSet<&'static str> {
    ["len", "first", "last", "rest", "push", "puts", "quote", "unquote"]
        .iter()
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlight(line: &str) -> String {
        highlight_line(line, &keywords(), &builtins())
    }

    #[test]
    fn test_number_highlighting() {
        assert!(highlight("42").contains(COLOR_NUMBER));
    }

    #[test]
    fn test_string_highlighting() {
        assert!(highlight("\"hello\"").contains(COLOR_STRING));
    }

    #[test]
    fn test_keyword_highlighting() {
        let highlighted = highlight("let x = fn(a) { a };");
        assert!(highlighted.contains(COLOR_KEYWORD));
        assert!(highlighted.contains(COLOR_DELIMITER));
    }

    #[test]
    fn test_builtin_highlighting() {
        assert!(highlight("len([1, 2])").contains(COLOR_BUILTIN));
    }

    #[test]
    fn test_plain_identifier_unchanged() {
        assert_eq!(highlight("foobar"), "foobar");
    }

    #[test]
    fn test_keyword_prefix_is_not_highlighted() {
        // "letter" starts with "let" but is a plain identifier
        assert_eq!(highlight("letter"), "letter");
    }

    #[test]
    fn test_unterminated_string_colored_to_end() {
        let highlighted = highlight("\"abc");
        assert!(highlighted.starts_with(COLOR_STRING));
        assert!(highlighted.ends_with(COLOR_RESET));
    }
}
