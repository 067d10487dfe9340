//! Cursor positions within a deck.

use derive_more::Display;
use serde::Deserialize;
use serde_json::Value;

/// A framework-specific location within a presentation.
///
/// Ordering is lexicographic: horizontal index first, then vertical, then
/// fragment. Normal traversal only ever moves forward in this ordering.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Position {
    /// A step-addressable position (slide, sub-slide, fragment).
    #[display("{h}.{v}.{f}")]
    Indexed { h: u64, v: u64, f: u64 },
    /// An opaque step counter for decks without a position API.
    #[display("#{_0}")]
    Counter(u64),
}

#[derive(Deserialize)]
struct Indices {
    #[serde(default)]
    h: u64,
    #[serde(default)]
    v: u64,
    #[serde(default)]
    f: u64,
}

impl Position {
    /// Decode the result of a position script: either `{ h, v, f }` or a
    /// plain non-negative index. Anything else (including `null`) means the
    /// position is unknown.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(|h| Self::Indexed { h, v: 0, f: 0 }),
            Value::Object(_) => {
                let Indices { h, v, f } = serde_json::from_value(value.clone()).ok()?;
                Some(Self::Indexed { h, v, f })
            },
            _ => None,
        }
    }

    /// The primary (horizontal) coordinate.
    pub fn primary(&self) -> u64 {
        match self {
            Self::Indexed { h, .. } => *h,
            Self::Counter(n) => *n,
        }
    }

    /// `true` if moving from `previous` to `self` means the deck wrapped
    /// around: the primary coordinate went backwards and landed on the
    /// session's origin.
    pub fn wrapped(&self, previous: &Self, origin: &Self) -> bool {
        self.primary() < previous.primary() && self.primary() == origin.primary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn at(h: u64, v: u64, f: u64) -> Position {
        Position::Indexed { h, v, f }
    }

    #[rstest]
    #[case(json!(3), Some(at(3, 0, 0)))]
    #[case(json!({"h": 2, "v": 1, "f": 4}), Some(at(2, 1, 4)))]
    #[case(json!({"h": 5}), Some(at(5, 0, 0)))]
    #[case(json!(-1), None)]
    #[case(json!(null), None)]
    #[case(json!("2"), None)]
    fn decode(#[case] value: Value, #[case] expected: Option<Position>) {
        assert_eq!(Position::from_value(&value), expected);
    }

    #[rstest]
    #[case(at(0, 0, 0), at(4, 0, 0), at(0, 0, 0), true)]
    #[case(at(0, 0, 0), at(4, 2, 1), at(0, 0, 0), true)]
    #[case(at(1, 0, 0), at(4, 0, 0), at(0, 0, 0), false)]
    #[case(at(5, 0, 0), at(4, 0, 0), at(0, 0, 0), false)]
    #[case(at(2, 0, 0), at(6, 0, 0), at(2, 0, 0), true)]
    fn wrap_detection(#[case] current: Position, #[case] previous: Position, #[case] origin: Position, #[case] expected: bool) {
        assert_eq!(current.wrapped(&previous, &origin), expected);
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(at(1, 0, 0) > at(0, 9, 9));
        assert!(at(1, 1, 0) > at(1, 0, 3));
        assert!(at(1, 1, 2) > at(1, 1, 1));
    }
}
