use std::cmp::Ordering;
use std::fmt;

/// The typed content of a [`Token`].
#[derive(Debug, Clone)]
pub enum TokenValue {
    Word(String),
    Integer(i64),
    Float(f64),
}

impl TokenValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, TokenValue::Integer(_) | TokenValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TokenValue::Word(_) => None,
            TokenValue::Integer(i) => Some(*i as f64),
            TokenValue::Float(f) => Some(*f),
        }
    }

    /// Name used in feedback messages
    pub fn type_name(&self) -> &'static str {
        match self {
            TokenValue::Word(_) => "word",
            TokenValue::Integer(_) => "integer",
            TokenValue::Float(_) => "float",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TokenValue::Word(_) => 0,
            TokenValue::Integer(_) => 1,
            TokenValue::Float(_) => 2,
        }
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Word(w) => write!(f, "{w}"),
            TokenValue::Integer(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" so floats never read as integers
            TokenValue::Float(x) => write!(f, "{x:?}"),
        }
    }
}

impl PartialEq for TokenValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TokenValue {}

impl PartialOrd for TokenValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TokenValue::Word(a), TokenValue::Word(b)) => a.cmp(b),
            (TokenValue::Integer(a), TokenValue::Integer(b)) => a.cmp(b),
            (TokenValue::Float(a), TokenValue::Float(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A typed span of program output. `start..end` are byte offsets into the
/// output the token was taken from.
///
/// Tokens order by `(start, end, value)`, which is also what makes two tokens
/// duplicates of each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
}

impl Token {
    pub fn new(value: TokenValue, start: usize, end: usize) -> Self {
        Self { start, end, value }
    }

    pub fn word(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self::new(TokenValue::Word(text.into()), start, end)
    }

    /// Shifts the token from line-local into whole-output coordinates.
    pub fn offset(mut self, delta: usize) -> Self {
        self.start += delta;
        self.end += delta;
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Sorts by start offset and drops duplicate tokens.
pub fn normalize(tokens: &mut Vec<Token>) {
    tokens.sort();
    tokens.dedup();
}
