//! Line/word tokenizer over character-alignment rows.
//!
//! Rows must arrive in (page, line, seq) order; that order is trusted, not
//! checked. A change of (page, line) ends the current line. Within a line a
//! row whose OCR character is whitespace or punctuation separates words.
//! Inserted rows (no OCR character) never separate words.

use std::iter::Peekable;

use crate::types::{CharRow, Correction, Token};

/// Lazily tokenize a book's rows, line by line.
pub fn tokens<I>(rows: I) -> Tokens<I::IntoIter>
where
    I: IntoIterator<Item = CharRow>,
{
    Tokens {
        rows: rows.into_iter().peekable(),
    }
}

/// Iterator returned by [`tokens`]. Finite and not restartable.
pub struct Tokens<I: Iterator<Item = CharRow>> {
    rows: Peekable<I>,
}

impl<I: Iterator<Item = CharRow>> Iterator for Tokens<I> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let mut word = WordBuilder::default();
        let mut line = None;
        while let Some(row) = self.rows.peek() {
            let key = (row.page_id, row.line_id);
            if line.is_some_and(|l| l != key) && !word.is_empty() {
                // leave the row for the next call
                return Some(word.finish());
            }
            line = Some(key);
            let Some(row) = self.rows.next() else { break };
            if is_boundary(&row) {
                if !word.is_empty() {
                    return Some(word.finish());
                }
                continue;
            }
            word.push(&row);
        }
        (!word.is_empty()).then(|| word.finish())
    }
}

fn is_boundary(row: &CharRow) -> bool {
    row.ocr.is_some_and(|c| c.is_whitespace() || is_punctuation(c))
}

/// ASCII punctuation plus the punctuation found in historical prints.
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}' // ¡
                | '\u{00A7}' // §
                | '\u{00AB}' // «
                | '\u{00B6}' // ¶
                | '\u{00B7}' // ·
                | '\u{00BB}' // »
                | '\u{00BF}' // ¿
                | '\u{2010}'..='\u{2027}' // dashes, quotes, bullets, ellipsis
                | '\u{2030}'..='\u{205E}'
                | '\u{2E00}'..='\u{2E4F}' // supplemental, incl. double oblique hyphen
                | '\u{3001}'..='\u{3003}'
                | '\u{3008}'..='\u{3011}'
        )
}

#[derive(Default)]
struct WordBuilder {
    ocr: String,
    cor: String,
    rows: usize,
    unresolved: bool,
}

impl WordBuilder {
    fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn push(&mut self, row: &CharRow) {
        self.rows += 1;
        if let Some(c) = row.ocr {
            self.ocr.push(c);
        }
        match row.cor {
            Correction::Char(c) => self.cor.push(c),
            Correction::Deleted => {}
            Correction::Unresolved => {
                // any uncertainty invalidates the whole token
                self.unresolved = true;
                if let Some(c) = row.ocr {
                    self.cor.push(c);
                }
            }
        }
    }

    fn finish(self) -> Token {
        Token {
            ocr: self.ocr,
            cor: self.cor,
            fully_corrected: !self.unresolved,
        }
    }
}
