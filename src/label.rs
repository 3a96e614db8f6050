//! Label values and their equivalence classes.
//!
//! A `Label` is the value attached to every node and edge: a `Mark` plus a
//! list of `Atom`s. The storage engine never evaluates labels; it only
//! deep-copies them and derives a `LabelClass`, the coarse shape category
//! that the matcher uses to prune candidates. Two labels in different
//! classes can never match, so the class doubles as an index key.
//!
//! # Invariants
//! - `LabelClass` is a pure function of label shape; it is recomputed
//!   whenever a label is replaced, never cached across relabelling.
//! - Labels attached to a host graph are fully evaluated; `Neg` and
//!   `Concat` atoms classify by their result type so an unevaluated label
//!   still lands in the bucket its value would occupy.
//!
//! # Citations
//! - Plump, "The Graph Programming Language GP" (2009) - label lists and
//!   marks
//! - Dodds & Plump, "Graph Transformation in Constant Time" (2006) -
//!   class-indexed candidate pruning

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Longest atom list a bounded label may carry.
///
/// Longer lists only arise through a list variable, which classifies as
/// [`LabelClass::ListVar`] before length is consulted.
pub const MAX_LIST_LENGTH: usize = 5;

/// Visual mark carried by a label.
///
/// Marks do not affect classification; they are matched separately by the
/// external engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mark {
    /// Unmarked.
    #[default]
    None,
    Red,
    Green,
    Blue,
    Grey,
    Dashed,
    /// Wildcard mark, only meaningful in rule graphs.
    Any,
}

impl Mark {
    /// Lowercase dump spelling, empty for `None`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mark::None => "",
            Mark::Red => "red",
            Mark::Green => "green",
            Mark::Blue => "blue",
            Mark::Grey => "grey",
            Mark::Dashed => "dashed",
            Mark::Any => "any",
        }
    }
}

/// One element of a label list.
///
/// Constants and variables are the evaluated forms; `Neg` and `Concat` are
/// the expression forms the external evaluator builds and reduces. The
/// engine treats all of them as opaque data: it deep-copies them and
/// classifies single-atom lists by the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Atom {
    /// Named variable of atomic (non-list) type.
    Variable(String),
    Integer(i64),
    String(String),
    /// Arithmetic negation of an integer expression.
    Neg(Box<Atom>),
    /// String concatenation.
    Concat(Box<Atom>, Box<Atom>),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Variable(name) => write!(f, "{}", name),
            Atom::Integer(value) => write!(f, "{}", value),
            Atom::String(value) => write!(f, "\"{}\"", value),
            Atom::Neg(exp) => write!(f, "- {}", exp),
            Atom::Concat(left, right) => write!(f, "({} . {})", left, right),
        }
    }
}

/// Equivalence class of a label, derived from its list shape.
///
/// The class set is small and closed, so the per-class indexes use a fixed
/// array indexed by [`LabelClass::as_index`] rather than a hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelClass {
    /// Empty list (the blank label).
    Empty,
    /// Single integer atom.
    Int,
    /// Single string atom.
    Str,
    /// Single atomic variable.
    AtomicVar,
    /// Fixed-length list of 2 atoms.
    List2,
    /// Fixed-length list of 3 atoms.
    List3,
    /// Fixed-length list of 4 atoms.
    List4,
    /// Fixed-length list of 5 atoms.
    List5,
    /// List containing a list variable; length is symbolic.
    ListVar,
}

impl LabelClass {
    /// Number of classes; the per-class index arrays have this length.
    pub const COUNT: usize = 9;

    /// Every class in `as_index` order.
    pub const ALL: [LabelClass; Self::COUNT] = [
        LabelClass::Empty,
        LabelClass::Int,
        LabelClass::Str,
        LabelClass::AtomicVar,
        LabelClass::List2,
        LabelClass::List3,
        LabelClass::List4,
        LabelClass::List5,
        LabelClass::ListVar,
    ];

    /// Dense array index of this class.
    #[inline]
    pub const fn as_index(self) -> usize {
        match self {
            LabelClass::Empty => 0,
            LabelClass::Int => 1,
            LabelClass::Str => 2,
            LabelClass::AtomicVar => 3,
            LabelClass::List2 => 4,
            LabelClass::List3 => 5,
            LabelClass::List4 => 6,
            LabelClass::List5 => 7,
            LabelClass::ListVar => 8,
        }
    }
}

impl fmt::Display for LabelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelClass::Empty => "empty",
            LabelClass::Int => "int",
            LabelClass::Str => "string",
            LabelClass::AtomicVar => "atomic-var",
            LabelClass::List2 => "list2",
            LabelClass::List3 => "list3",
            LabelClass::List4 => "list4",
            LabelClass::List5 => "list5",
            LabelClass::ListVar => "list-var",
        };
        write!(f, "{}", name)
    }
}

/// A mark plus a list of atoms.
///
/// Deep copy is structural `Clone`: boxed expressions are cloned
/// recursively and copies share nothing with the original.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Label {
    /// Visual mark.
    pub mark: Mark,
    /// Atom list, outermost order.
    pub list: Vec<Atom>,
    /// Whether `list` contains a variable of list type. Set at
    /// construction by the evaluator; a list variable is not
    /// distinguishable from an atomic variable by name alone.
    pub has_list_variable: bool,
}

impl Label {
    /// The blank label: no mark, empty list.
    pub fn blank() -> Self {
        Self::default()
    }

    /// A fully evaluated label (no list variable).
    pub fn new(mark: Mark, list: Vec<Atom>) -> Self {
        Self {
            mark,
            list,
            has_list_variable: false,
        }
    }

    /// A label whose list contains a list variable.
    pub fn with_list_variable(mark: Mark, list: Vec<Atom>) -> Self {
        Self {
            mark,
            list,
            has_list_variable: true,
        }
    }

    /// Derives the equivalence class of this label.
    ///
    /// Pure in label shape. Bounded lists longer than
    /// [`MAX_LIST_LENGTH`] are outside the language contract and fold
    /// into [`LabelClass::ListVar`] after logging.
    pub fn class(&self) -> LabelClass {
        if self.has_list_variable {
            return LabelClass::ListVar;
        }
        match self.list.len() {
            0 => LabelClass::Empty,
            1 => match &self.list[0] {
                Atom::Variable(_) => LabelClass::AtomicVar,
                Atom::Integer(_) | Atom::Neg(_) => LabelClass::Int,
                Atom::String(_) | Atom::Concat(_, _) => LabelClass::Str,
            },
            2 => LabelClass::List2,
            3 => LabelClass::List3,
            4 => LabelClass::List4,
            5 => LabelClass::List5,
            length => {
                warn!(length, "label list exceeds the language maximum");
                LabelClass::ListVar
            }
        }
    }
}

impl fmt::Display for Label {
    /// Dump spelling: atoms joined by `:`, `empty` for the blank list,
    /// then ` # <mark>` for marked labels.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list.is_empty() {
            write!(f, "empty")?;
        } else {
            for (position, atom) in self.list.iter().enumerate() {
                if position > 0 {
                    write!(f, " : ")?;
                }
                write!(f, "{}", atom)?;
            }
        }
        if self.mark != Mark::None {
            write!(f, " # {}", self.mark.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(Label::blank().class(), LabelClass::Empty);
        assert_eq!(
            Label::new(Mark::None, vec![Atom::Integer(7)]).class(),
            LabelClass::Int
        );
        assert_eq!(
            Label::new(Mark::None, vec![Atom::Neg(Box::new(Atom::Integer(7)))]).class(),
            LabelClass::Int
        );
        assert_eq!(
            Label::new(Mark::None, vec![Atom::String("a".into())]).class(),
            LabelClass::Str
        );
        assert_eq!(
            Label::new(
                Mark::None,
                vec![Atom::Concat(
                    Box::new(Atom::String("a".into())),
                    Box::new(Atom::String("b".into())),
                )]
            )
            .class(),
            LabelClass::Str
        );
        assert_eq!(
            Label::new(Mark::None, vec![Atom::Variable("x".into())]).class(),
            LabelClass::AtomicVar
        );
        assert_eq!(
            Label::new(Mark::None, vec![Atom::Integer(1), Atom::Integer(2)]).class(),
            LabelClass::List2
        );
        assert_eq!(
            Label::new(Mark::None, vec![Atom::Integer(0); 5]).class(),
            LabelClass::List5
        );
        assert_eq!(
            Label::with_list_variable(Mark::None, vec![Atom::Variable("xs".into())]).class(),
            LabelClass::ListVar
        );
    }

    #[test]
    fn mark_does_not_affect_class() {
        let plain = Label::new(Mark::None, vec![Atom::Integer(1)]);
        let marked = Label::new(Mark::Red, vec![Atom::Integer(1)]);
        assert_eq!(plain.class(), marked.class());
    }

    #[test]
    fn deep_copy_is_independent() {
        let original = Label::new(
            Mark::Blue,
            vec![Atom::Concat(
                Box::new(Atom::String("a".into())),
                Box::new(Atom::Variable("s".into())),
            )],
        );
        let mut copy = original.clone();
        copy.mark = Mark::None;
        copy.list[0] = Atom::Integer(0);
        assert_eq!(original.mark, Mark::Blue);
        assert!(matches!(original.list[0], Atom::Concat(_, _)));
    }

    #[test]
    fn class_indices_are_dense_and_distinct() {
        for (position, class) in LabelClass::ALL.iter().enumerate() {
            assert_eq!(class.as_index(), position);
        }
    }

    #[test]
    fn dump_spelling() {
        assert_eq!(Label::blank().to_string(), "empty");
        let label = Label::new(
            Mark::Red,
            vec![Atom::Integer(3), Atom::String("go".into()), Atom::Variable("x".into())],
        );
        assert_eq!(label.to_string(), "3 : \"go\" : x # red");
        let neg = Label::new(Mark::None, vec![Atom::Neg(Box::new(Atom::Integer(4)))]);
        assert_eq!(neg.to_string(), "- 4");
    }
}
