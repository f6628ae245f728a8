//! Whitespace token cursor shared by the line parsers.
//!
//! Engine output is not a fixed grammar: option names run until the `type`
//! keyword, and keys such as `pv` or `string` swallow the rest of the line.
//! The cursor keeps the unread remainder as a slice of the input line so
//! those keys can take it verbatim.

use std::str::FromStr;

#[derive(Clone, Debug)]
pub(crate) struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    pub(crate) fn peek(&self) -> Option<&'a str> {
        split(self.rest).0
    }

    /// Consume tokens up to (not including) `keyword`, or to the end of the line.
    pub(crate) fn take_until(&mut self, keyword: &str) -> Vec<&'a str> {
        let mut taken = Vec::new();
        while let Some(token) = self.peek() {
            if token == keyword {
                break;
            }
            taken.push(token);
            self.next();
        }
        taken
    }

    /// Consume every remaining token.
    pub(crate) fn take_rest(&mut self) -> Vec<String> {
        self.by_ref().map(str::to_string).collect()
    }

    /// Consume the rest of the line as raw text, keeping inner spacing.
    pub(crate) fn remainder(&mut self) -> &'a str {
        let rest = self.rest.trim();
        self.rest = "";
        rest
    }

    /// Consume the next token and parse it. `None` if missing or unparseable.
    pub(crate) fn parse_next<T: FromStr>(&mut self) -> Option<T> {
        self.next()?.parse().ok()
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (head, tail) = split(self.rest);
        self.rest = tail;
        head
    }
}

fn split(s: &str) -> (Option<&str>, &str) {
    let s = s.trim_start();
    if s.is_empty() {
        return (None, s);
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let (head, tail) = s.split_at(end);
    (Some(head), tail)
}
