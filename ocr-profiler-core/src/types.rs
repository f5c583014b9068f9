use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Scalar aliases ───────────────────────────────────────────

/// Book (unit of work) identifier.
pub type BookId = i32;

/// Interned surface string identifier (`types.id`).
pub type TypeId = i32;

/// Row identifier of a persisted suggestion.
pub type SuggestionId = i32;

// ─── Character alignment ──────────────────────────────────────

/// Correction side of one aligned character.
///
/// Stored as an integer column: `0` = unresolved, `-1` = deleted,
/// anything else is a code point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correction {
    /// Never reviewed, or reviewed without a decision.
    Unresolved,
    /// The corrector removed the OCR character.
    Deleted,
    Char(char),
}

impl Correction {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Correction::Unresolved,
            -1 => Correction::Deleted,
            c => u32::try_from(c)
                .ok()
                .and_then(char::from_u32)
                .map(Correction::Char)
                .unwrap_or(Correction::Unresolved),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Correction::Unresolved => 0,
            Correction::Deleted => -1,
            Correction::Char(c) => c as i32,
        }
    }
}

/// One OCR character paired with its correction.
///
/// Rows of a book are expected in (page, line, seq) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharRow {
    pub page_id: i32,
    pub line_id: i32,
    pub seq: i32,
    /// `None` for characters inserted by the corrector.
    pub ocr: Option<char>,
    pub cor: Correction,
}

impl CharRow {
    /// Build a row from the integer encoding used by the `contents` table.
    pub fn from_codes(page_id: i32, line_id: i32, seq: i32, ocr: i32, cor: i32) -> Self {
        let ocr = u32::try_from(ocr)
            .ok()
            .filter(|c| *c != 0)
            .and_then(char::from_u32);
        Self {
            page_id,
            line_id,
            seq,
            ocr,
            cor: Correction::from_code(cor),
        }
    }
}

// ─── Tokens ───────────────────────────────────────────────────

/// A word submitted to the profiling engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Token {
    pub ocr: String,
    pub cor: String,
    /// True iff no character of the token is still unresolved.
    pub fully_corrected: bool,
}

impl Token {
    /// OCR form plus the correction, which is withheld unless the token is
    /// fully corrected.
    pub fn engine_input(&self) -> (&str, Option<&str>) {
        let cor = self.fully_corrected.then_some(self.cor.as_str());
        (self.ocr.as_str(), cor)
    }
}

// ─── Engine output ────────────────────────────────────────────

/// A localized substitution `left -> right`, optionally at a position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pattern {
    pub left: String,
    pub right: String,
    #[serde(default)]
    pub pos: i32,
}

impl Pattern {
    /// Normalized key stored in `errorpatterns.pattern`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.left, self.right)
    }

    /// Comma-joined `left:right:pos` list stored on the suggestion row.
    pub fn join(patterns: &[Pattern]) -> String {
        patterns
            .iter()
            .map(|p| format!("{}:{}:{}", p.left, p.right, p.pos))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Inverse of [`Pattern::join`]. Malformed entries are skipped.
    pub fn split(joined: &str) -> Vec<Pattern> {
        joined
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| {
                let mut it = s.rsplitn(3, ':');
                let pos = it.next()?.parse().ok()?;
                let right = it.next()?;
                let left = it.next()?;
                Some(Pattern {
                    left: left.to_string(),
                    right: right.to_string(),
                    pos,
                })
            })
            .collect()
    }
}

/// One ranked correction proposal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Candidate {
    pub suggestion: String,
    #[serde(default)]
    pub modern: String,
    /// Suggestion found in a dictionary.
    #[serde(default)]
    pub dict: bool,
    #[serde(default)]
    pub hist_patterns: Vec<Pattern>,
    #[serde(default, rename = "OCRPatterns")]
    pub ocr_patterns: Vec<Pattern>,
    pub distance: i32,
    pub weight: f64,
}

/// All candidates the engine proposes for one OCR type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    #[serde(rename = "OCR")]
    pub ocr: String,
    #[serde(rename = "N")]
    pub n: u64,
    #[serde(rename = "Candidates", default)]
    pub candidates: Vec<Candidate>,
}

/// The full engine output for one book.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub book_id: BookId,
    /// Keyed by OCR type.
    pub profile: BTreeMap<String, Interpretation>,
}

// ─── Books ────────────────────────────────────────────────────

/// Processing state of a book. Ordered: transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    Empty = 1,
    Profiled = 2,
    ExtendedLexicon = 3,
    ProfiledWithEl = 4,
    PostCorrected = 5,
}

impl BookStatus {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Empty),
            2 => Some(Self::Profiled),
            3 => Some(Self::ExtendedLexicon),
            4 => Some(Self::ProfiledWithEl),
            5 => Some(Self::PostCorrected),
            _ => None,
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Profiled => "profiled",
            Self::ExtendedLexicon => "extended-lexicon",
            Self::ProfiledWithEl => "profiled-with-el",
            Self::PostCorrected => "post-corrected",
        };
        f.write_str(s)
    }
}

/// Book metadata needed to profile it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: BookId,
    /// Declared language, matched against the language directory.
    pub lang: String,
    /// Project directory relative to the project-data root.
    pub directory: String,
    pub status: BookStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_codes() {
        assert_eq!(Correction::from_code(0), Correction::Unresolved);
        assert_eq!(Correction::from_code(-1), Correction::Deleted);
        assert_eq!(Correction::from_code('a' as i32), Correction::Char('a'));
        assert_eq!(Correction::from_code(-7), Correction::Unresolved);
        assert_eq!(Correction::Char('ß').code(), 'ß' as i32);
    }

    #[test]
    fn char_row_zero_ocr_is_insertion() {
        let row = CharRow::from_codes(1, 2, 3, 0, 'x' as i32);
        assert_eq!(row.ocr, None);
        assert_eq!(row.cor, Correction::Char('x'));
    }

    #[test]
    fn engine_input_withholds_uncertain_correction() {
        let t = Token {
            ocr: "teh".into(),
            cor: "the".into(),
            fully_corrected: false,
        };
        assert_eq!(t.engine_input(), ("teh", None));
        let t = Token {
            fully_corrected: true,
            ..t
        };
        assert_eq!(t.engine_input(), ("teh", Some("the")));
    }

    #[test]
    fn pattern_strings() {
        let ps = vec![
            Pattern {
                left: "t".into(),
                right: "th".into(),
                pos: 0,
            },
            Pattern {
                left: "".into(),
                right: "e".into(),
                pos: 3,
            },
        ];
        assert_eq!(ps[0].key(), "t:th");
        let joined = Pattern::join(&ps);
        assert_eq!(joined, "t:th:0,:e:3");
        assert_eq!(Pattern::split(&joined), ps);
        assert!(Pattern::split("").is_empty());
    }

    #[test]
    fn status_ordering() {
        assert!(BookStatus::Empty < BookStatus::Profiled);
        assert!(BookStatus::PostCorrected > BookStatus::Profiled);
        assert_eq!(
            BookStatus::from_id(BookStatus::ProfiledWithEl.id()),
            Some(BookStatus::ProfiledWithEl)
        );
        assert_eq!(BookStatus::from_id(9), None);
        assert_eq!(BookStatus::Profiled.to_string(), "profiled");
    }

    #[test]
    fn interpretation_decodes_engine_json() {
        let json = r#"{"OCR":"teh","N":3,"Candidates":[{"Suggestion":"the","Modern":"the",
            "Dict":true,"HistPatterns":[],"OCRPatterns":[{"Left":"eh","Right":"he","Pos":1}],
            "Distance":1,"Weight":0.9}]}"#;
        let interp: Interpretation = serde_json::from_str(json).unwrap();
        assert_eq!(interp.n, 3);
        assert_eq!(interp.candidates[0].ocr_patterns[0].key(), "eh:he");
        assert_eq!(interp.candidates[0].weight, 0.9);
    }
}
