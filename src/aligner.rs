//! Finds the tokens of one output that change when it is turned into another.

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::line_matcher::match_lines;
use crate::settings::Settings;
use crate::token::{Token, TokenValue};
use crate::tokenizer::{Span, SpanKind, Tokenizer};

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffAligner {
    tokenizer: Tokenizer,
    ignore_nonnumeric_tokens: bool,
    connect_adjacent_words: bool,
}

impl DiffAligner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            tokenizer: Tokenizer::new(settings.collapse_whitespace),
            ignore_nonnumeric_tokens: settings.ignore_nonnumeric_tokens,
            connect_adjacent_words: settings.connect_adjacent_words,
        }
    }

    /// Diff tokens of a whole (possibly multi-line) output, with offsets into
    /// `before`.
    pub fn diff_output(&self, before: &str, after: &str) -> Vec<Token> {
        if before == after {
            return Vec::new();
        }

        match_lines(before, after)
            .into_iter()
            .filter(|pair| pair.before != pair.after)
            .flat_map(|pair| {
                self.token_vector(pair.before, pair.after)
                    .into_iter()
                    .map(move |token| token.offset(pair.line_start))
            })
            .collect()
    }

    /// Tokens of `before` whose characters are deleted, substituted, or
    /// next to an insertion when `before` is edited into `after`.
    pub fn token_vector(&self, before: &str, after: &str) -> Vec<Token> {
        if before == after || before.is_empty() {
            return Vec::new();
        }

        let spans: Vec<Span> = self.tokenizer.spans(before).collect();
        let window = Window::around_changes(before, after, &spans);
        let Edits {
            mut changed,
            insertions,
        } = mark_changes(before, after, &window);

        for insertion in insertions {
            if let Some(owner) = self.insertion_owner(&spans, insertion) {
                changed[owner.start..owner.end].fill(true);
            }
        }

        let mut tokens = Vec::new();
        let mut run: Option<WordRun> = None;

        for span in spans.iter().filter(|s| self.is_candidate(s)) {
            if !changed[span.start..span.end].iter().any(|&c| c) {
                self.flush(&mut run, before, &mut tokens);
                continue;
            }

            if span.is_numeric() {
                self.flush(&mut run, before, &mut tokens);
                tokens.push(span.to_token());
                continue;
            }

            if self.connect_adjacent_words {
                if let Some(r) = run.as_mut() {
                    r.extend(span);
                    continue;
                }
            }
            self.flush(&mut run, before, &mut tokens);
            run = Some(WordRun::start(span));
        }
        self.flush(&mut run, before, &mut tokens);

        tokens
    }

    /// The span charged with an insertion: the one holding the preceding
    /// character, or the nearest candidate when that character is dropped
    /// whitespace or the insertion opens the line.
    fn insertion_owner<'s, 'a>(
        &self,
        spans: &'s [Span<'a>],
        insertion: Insertion,
    ) -> Option<&'s Span<'a>> {
        let preceding = insertion
            .pos
            .checked_sub(1)
            .and_then(|p| spans.iter().find(|s| s.contains(p)));

        if let Some(span) = preceding {
            if span.kind != SpanKind::Whitespace || self.is_candidate(span) {
                return Some(span);
            }
        }
        if insertion.whitespace && self.tokenizer.collapse_whitespace {
            return None;
        }

        spans
            .iter()
            .find(|s| s.start >= insertion.pos && self.is_candidate(s))
            .or_else(|| {
                spans
                    .iter()
                    .rev()
                    .find(|s| s.end <= insertion.pos && self.is_candidate(s))
            })
    }

    fn is_candidate(&self, span: &Span) -> bool {
        if self.tokenizer.collapse_whitespace && span.kind == SpanKind::Whitespace {
            return false;
        }
        span.is_numeric() || !self.ignore_nonnumeric_tokens
    }

    fn flush(&self, run: &mut Option<WordRun>, line: &str, tokens: &mut Vec<Token>) {
        if let Some(r) = run.take() {
            let text = if self.tokenizer.collapse_whitespace {
                r.fragments.join(" ")
            } else {
                line[r.start..r.end].to_string()
            };
            tokens.push(Token::new(TokenValue::Word(text), r.start, r.end));
        }
    }
}

/// Consecutive changed word (and, when kept, whitespace) spans.
struct WordRun<'a> {
    start: usize,
    end: usize,
    fragments: Vec<&'a str>,
}

impl<'a> WordRun<'a> {
    fn start(span: &Span<'a>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            fragments: vec![span.text],
        }
    }

    fn extend(&mut self, span: &Span<'a>) {
        self.end = span.end;
        self.fragments.push(span.text);
    }
}

/// The part of both lines that actually goes through the character diff.
///
/// The common prefix and suffix are skipped, but the window always starts at
/// the beginning of the token holding the last unchanged prefix character and
/// ends at the end of the token holding the first differing suffix position,
/// so tokens are never split.
#[derive(Debug, PartialEq, Eq)]
struct Window {
    start: usize,
    before_end: usize,
    after_end: usize,
}

impl Window {
    fn around_changes(before: &str, after: &str, spans: &[Span]) -> Self {
        let prefix = common_prefix_len(before, after);
        let suffix = common_suffix_len(before, after, before.len().min(after.len()) - prefix);

        let containing = |pos: usize| spans.iter().find(|s| s.contains(pos));

        let start = containing(prefix.saturating_sub(1)).map_or(0, |s| s.start);
        let last = (before.len() - suffix).max(start + 1);
        let before_end = containing(last - 1).map_or(before.len(), |s| s.end);

        Self {
            start,
            before_end,
            after_end: after.len() - (before.len() - before_end),
        }
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

fn common_suffix_len(a: &str, b: &str, limit: usize) -> usize {
    let mut len = 0;
    for (x, y) in a.chars().rev().zip(b.chars().rev()) {
        if x != y || len + x.len_utf8() > limit {
            break;
        }
        len += x.len_utf8();
    }
    len
}

/// Text inserted before byte `pos` of the "before" line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Insertion {
    pos: usize,
    whitespace: bool,
}

struct Edits {
    /// One flag per byte of "before", set for deleted or substituted characters
    changed: Vec<bool>,
    insertions: Vec<Insertion>,
}

fn mark_changes(before: &str, after: &str, window: &Window) -> Edits {
    let mut changed = vec![false; before.len()];
    let mut insertions = Vec::new();

    let old = &before[window.start..window.before_end];
    let new = &after[window.start..window.after_end];

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);

    let mut pos = window.start;
    for change in diff.iter_all_changes() {
        let len = change.value().len();
        match change.tag() {
            ChangeTag::Equal => pos += len,
            ChangeTag::Delete => {
                changed[pos..pos + len].fill(true);
                pos += len;
            }
            ChangeTag::Insert => insertions.push(Insertion {
                pos,
                whitespace: change.value().chars().all(char::is_whitespace),
            }),
        }
    }

    Edits {
        changed,
        insertions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner(settings: Settings) -> DiffAligner {
        DiffAligner::new(&settings)
    }

    fn values(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.value.to_string()).collect()
    }

    #[test]
    fn identical_lines_have_no_tokens() {
        let a = aligner(Settings::default());
        assert!(a.token_vector("same line", "same line").is_empty());
        assert!(a.diff_output("x\ny\n", "x\ny\n").is_empty());
    }

    #[test]
    fn changed_word_is_reported() {
        let a = aligner(Settings::default());
        let tokens = a.token_vector("Hello World", "Hello Wrold");
        assert_eq!(tokens, vec![Token::word("World", 6, 11)]);
    }

    #[test]
    fn changed_number_is_typed() {
        let a = aligner(Settings::default());
        let tokens = a.token_vector("Result: 98.6", "Result: 98.7");
        assert_eq!(tokens, vec![Token::new(TokenValue::Float(98.6), 8, 12)]);
    }

    #[test]
    fn insertion_attaches_to_preceding_token() {
        let a = aligner(Settings::default());
        let tokens = a.token_vector("total 12", "total 123");
        assert_eq!(values(&tokens), vec!["12"]);

        let tokens = a.token_vector("ab cd", "Xab cd");
        assert_eq!(values(&tokens), vec!["ab"]);
    }

    #[test]
    fn insertion_after_whitespace_goes_to_next_token() {
        let a = aligner(Settings::default());
        let tokens = a.token_vector("Score 5", "Score 15");
        assert_eq!(tokens, vec![Token::new(TokenValue::Integer(5), 6, 7)]);

        let tokens = a.token_vector("Value: 5", "Value: -5");
        assert_eq!(tokens, vec![Token::new(TokenValue::Integer(5), 7, 8)]);
    }

    #[test]
    fn inserted_whitespace_is_ignored_when_collapsing() {
        let a = aligner(Settings::default());
        assert!(a.token_vector("Score 5", "Score  5").is_empty());
    }

    #[test]
    fn trailing_insertion_goes_to_previous_token() {
        let a = aligner(Settings::default());
        let tokens = a.token_vector("total ", "total 7");
        assert_eq!(values(&tokens), vec!["total"]);
    }

    #[test]
    fn window_never_splits_tokens() {
        let before = "value 12345 end";
        let after = "value 12945 end";
        let spans: Vec<_> = Tokenizer::new(false).spans(before).collect();
        let w = Window::around_changes(before, after, &spans);
        assert_eq!(w.start, 6);
        assert_eq!(w.before_end, 11);
        assert_eq!(w.after_end, 11);
    }

    #[test]
    fn adjacent_words_merge_when_enabled() {
        let before = "the quick fox";
        let after = "a slow fox";

        let separate = aligner(Settings::default()).token_vector(before, after);
        assert_eq!(values(&separate), vec!["the", "quick"]);

        let merged = aligner(Settings::default().with_connect_adjacent_words(true))
            .token_vector(before, after);
        assert_eq!(merged, vec![Token::word("the quick", 0, 9)]);
    }

    #[test]
    fn numbers_are_never_merged() {
        let a = aligner(Settings::default().with_connect_adjacent_words(true));
        let tokens = a.token_vector("x 1 y", "z 2 w");
        assert_eq!(values(&tokens), vec!["x", "1", "y"]);
    }

    #[test]
    fn nonnumeric_tokens_can_be_ignored() {
        let a = aligner(Settings::default().with_ignore_nonnumeric_tokens(true));
        let tokens = a.token_vector("Sum is 5 apples", "Total is 6 pears");
        assert_eq!(tokens, vec![Token::new(TokenValue::Integer(5), 7, 8)]);
    }

    #[test]
    fn deleted_line_marks_every_token() {
        let a = aligner(Settings::default());
        let tokens = a.diff_output("keep\ngone 4\n", "keep\n");
        assert_eq!(
            tokens,
            vec![
                Token::word("gone", 5, 9),
                Token::new(TokenValue::Integer(4), 10, 11)
            ]
        );
    }

    #[test]
    fn offsets_follow_lines() {
        let a = aligner(Settings::default());
        let before = "Line 1\nAnswer: 42\n";
        let tokens = a.diff_output(before, "Line 1\nAnswer: 41\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(&before[tokens[0].start..tokens[0].end], "42");
    }
}
