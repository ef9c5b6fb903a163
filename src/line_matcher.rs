use similar::{capture_diff_slices, Algorithm, DiffTag};

/// One line of the "before" output together with the line it corresponds to
/// in the "after" output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePair<'a> {
    pub before: &'a str,
    pub after: &'a str,
    /// Byte offset of `before` within the whole "before" output
    pub line_start: usize,
}

struct Lines<'a> {
    text: Vec<&'a str>,
    starts: Vec<usize>,
    len: usize,
}

impl<'a> Lines<'a> {
    fn split(output: &'a str) -> Self {
        let mut text = Vec::new();
        let mut starts = Vec::new();
        let mut pos = 0;

        for raw in output.split_inclusive('\n') {
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            let line = line.strip_suffix('\r').unwrap_or(line);
            text.push(line);
            starts.push(pos);
            pos += raw.len();
        }

        Self {
            text,
            starts,
            len: output.len(),
        }
    }

    fn start(&self, index: usize) -> usize {
        self.starts.get(index).copied().unwrap_or(self.len)
    }
}

/// Pairs up the lines of two outputs with a line-level Myers diff.
///
/// Every "before" line appears in exactly one pair, in order. Replaced lines are
/// paired one to one; surplus deletions get an empty `after` and surplus
/// insertions an empty `before`. Insertion-only pairs carry the offset of the
/// next "before" line and do not advance it.
///
/// Offsets are not a running `len(before) + 1` count over every pair: lines
/// that exist only in "after" add nothing, and `\r\n` endings count both
/// bytes. That keeps every `line_start` an exact byte offset into `before`.
pub fn match_lines<'a>(before: &'a str, after: &'a str) -> Vec<LinePair<'a>> {
    let old = Lines::split(before);
    let new = Lines::split(after);

    let mut pairs = Vec::with_capacity(old.text.len());

    for op in capture_diff_slices(Algorithm::Myers, &old.text, &new.text) {
        let (tag, old_range, new_range) = op.as_tag_tuple();

        match tag {
            DiffTag::Equal => {
                for i in old_range {
                    pairs.push(LinePair {
                        before: old.text[i],
                        after: old.text[i],
                        line_start: old.start(i),
                    });
                }
            }
            DiffTag::Delete | DiffTag::Insert | DiffTag::Replace => {
                let paired = old_range.len().max(new_range.len());
                for k in 0..paired {
                    let before_line = old_range.start + k;
                    let after_line = new_range.start + k;

                    pairs.push(LinePair {
                        before: if before_line < old_range.end {
                            old.text[before_line]
                        } else {
                            ""
                        },
                        after: if after_line < new_range.end {
                            new.text[after_line]
                        } else {
                            ""
                        },
                        line_start: old.start(before_line.min(old_range.end)),
                    });
                }
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_lines_pair_with_themselves() {
        let pairs = match_lines("a\nbb\nc", "a\nbb\nc");
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|p| p.before == p.after));
        let starts: Vec<_> = pairs.iter().map(|p| p.line_start).collect();
        assert_eq!(starts, vec![0, 2, 5]);
    }

    #[test]
    fn changed_line_is_paired() {
        let pairs = match_lines("x = 1\ny = 2\n", "x = 1\ny = 3\n");
        assert_eq!(
            pairs[1],
            LinePair {
                before: "y = 2",
                after: "y = 3",
                line_start: 6
            }
        );
    }

    #[test]
    fn deleted_and_inserted_lines() {
        let pairs = match_lines("a\nb\nc\n", "a\nc\nd\n");
        let before: Vec<_> = pairs.iter().map(|p| p.before).collect();
        assert_eq!(before.iter().filter(|l| !l.is_empty()).count(), 3);
        assert!(pairs.contains(&LinePair {
            before: "b",
            after: "",
            line_start: 2
        }));
        assert!(pairs.contains(&LinePair {
            before: "",
            after: "d",
            line_start: 6
        }));
    }

    #[test]
    fn crlf_offsets_are_exact() {
        let pairs = match_lines("ab\r\ncd\r\n", "ab\r\nce\r\n");
        assert_eq!(pairs[1].before, "cd");
        assert_eq!(pairs[1].line_start, 4);
    }
}
