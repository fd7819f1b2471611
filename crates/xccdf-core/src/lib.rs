//! XCCDF core primitives and shared types.
//!
//! Everything in this crate is pure, allocation-light logic with no I/O: the
//! three-valued result algebra (`result`) and the monotonic item-id
//! allocator (`ids`) that the `xccdf-policy` crate's Benchmark arena builds
//! on. Keeping them here lets both be unit-tested in isolation from the
//! evaluation engine that consumes them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ids {
    //! Monotonic integer id allocation for the Benchmark item arena.

    use std::sync::atomic::{AtomicU32, Ordering};

    use serde::{Deserialize, Serialize};

    /// Opaque identifier for an item slot in a Benchmark arena.
    ///
    /// Ids are minted in document order starting at zero; the Benchmark root
    /// is always `ItemId(0)`. Tailoring clones mint fresh ids from the same
    /// counter, so a clone can never alias a live document id.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ItemId(pub u32);

    impl ItemId {
        /// The id always assigned to the Benchmark root.
        pub const ROOT: ItemId = ItemId(0);
    }

    impl std::fmt::Display for ItemId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    /// Allocates [`ItemId`]s in increasing order, starting at zero.
    #[derive(Debug, Default)]
    pub struct IdAllocator {
        next: AtomicU32,
    }

    impl IdAllocator {
        /// Create a fresh allocator whose first id will be `ItemId(0)`.
        pub fn new() -> Self {
            Self { next: AtomicU32::new(0) }
        }

        /// Mint the next id in sequence.
        pub fn next(&self) -> ItemId {
            ItemId(self.next.fetch_add(1, Ordering::Relaxed))
        }
    }

}

pub mod result {
    //! The XCCDF three-valued-plus-skip result algebra.

    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// Outcome of evaluating a check or a Rule.
    ///
    /// Variants are declared in rank order (`Pass` lowest, `Informational`
    /// highest); [`ResultKind::rank`] returns the 1-based position used by
    /// the reduction tables below. `Fixed` is not itself ranked: it
    /// normalizes to `Pass` before every table lookup (it scores like a
    /// pass, §4.9) but remains a distinct wire value so a reporter can tell
    /// "passed outright" from "passed after remediation".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum ResultKind {
        /// The check succeeded.
        Pass,
        /// The check failed.
        Fail,
        /// The checking engine could not complete evaluation.
        Error,
        /// The outcome could not be determined.
        Unknown,
        /// The Rule does not apply to this platform.
        NotApplicable,
        /// No check was evaluated (no candidate/applicable check found).
        NotChecked,
        /// The Rule was not selected for evaluation.
        NotSelected,
        /// The Rule is informational only.
        Informational,
        /// The check failed but a remediation was applied and re-verified.
        Fixed,
    }

    impl ResultKind {
        /// 1-based rank used by the reduction tables; `Fixed` ranks as `Pass`.
        #[must_use]
        pub const fn rank(self) -> u8 {
            match self {
                ResultKind::Pass | ResultKind::Fixed => 1,
                ResultKind::Fail => 2,
                ResultKind::Error => 3,
                ResultKind::Unknown => 4,
                ResultKind::NotApplicable => 5,
                ResultKind::NotChecked => 6,
                ResultKind::NotSelected => 7,
                ResultKind::Informational => 8,
            }
        }

        /// `Fixed` collapses to `Pass`; every other kind is unchanged.
        #[must_use]
        pub const fn normalize(self) -> ResultKind {
            match self {
                ResultKind::Fixed => ResultKind::Pass,
                other => other,
            }
        }

        /// True for the four "skip" kinds that carry no pass/fail verdict
        /// and are ignored by the Score Engine (§4.9).
        #[must_use]
        pub const fn is_skip(self) -> bool {
            self.rank() >= 5
        }

        /// True for `Pass` and `Fixed`, the two kinds the Score Engine
        /// treats as a passing leaf.
        #[must_use]
        pub const fn is_passing(self) -> bool {
            matches!(self.normalize(), ResultKind::Pass)
        }
    }

    impl fmt::Display for ResultKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = match self {
                ResultKind::Pass => "pass",
                ResultKind::Fail => "fail",
                ResultKind::Error => "error",
                ResultKind::Unknown => "unknown",
                ResultKind::NotApplicable => "notapplicable",
                ResultKind::NotChecked => "notchecked",
                ResultKind::NotSelected => "notselected",
                ResultKind::Informational => "informational",
                ResultKind::Fixed => "fixed",
            };
            f.write_str(s)
        }
    }

    /// Row `r-1`, column `c-1` of [`AND_TABLE`]/[`OR_TABLE`] holds the result
    /// of combining the kinds of rank `r` and `c`. Declared as a literal
    /// constant so the logic in §4.1 stays auditable against this table
    /// rather than against branching code.
    type Table = [[ResultKind; 8]; 8];

    use ResultKind::{Error, Fail, Informational, NotApplicable, NotChecked, NotSelected, Pass, Unknown};

    /// Three-valued AND: Fail dominates, then Error, then Unknown; among the
    /// remaining combinations Pass is the identity and the higher-ranked
    /// (more "skip-like") kind wins.
    pub const AND_TABLE: Table = [
        // Pass
        [Pass, Fail, Error, Unknown, NotApplicable, NotChecked, NotSelected, Informational],
        // Fail
        [Fail, Fail, Fail, Fail, Fail, Fail, Fail, Fail],
        // Error
        [Error, Fail, Error, Error, Error, Error, Error, Error],
        // Unknown
        [Unknown, Fail, Error, Unknown, Unknown, Unknown, Unknown, Unknown],
        // NotApplicable
        [NotApplicable, Fail, Error, Unknown, NotApplicable, NotChecked, NotSelected, Informational],
        // NotChecked
        [NotChecked, Fail, Error, Unknown, NotChecked, NotChecked, NotSelected, Informational],
        // NotSelected
        [NotSelected, Fail, Error, Unknown, NotSelected, NotSelected, NotSelected, Informational],
        // Informational
        [Informational, Fail, Error, Unknown, Informational, Informational, Informational, Informational],
    ];

    /// Three-valued OR: the dual of [`AND_TABLE`] with Pass and Fail swapped.
    pub const OR_TABLE: Table = [
        // Pass
        [Pass, Pass, Pass, Pass, Pass, Pass, Pass, Pass],
        // Fail
        [Pass, Fail, Error, Unknown, NotApplicable, NotChecked, NotSelected, Informational],
        // Error
        [Pass, Error, Error, Error, Error, Error, Error, Error],
        // Unknown
        [Pass, Unknown, Error, Unknown, Unknown, Unknown, Unknown, Unknown],
        // NotApplicable
        [Pass, NotApplicable, Error, Unknown, NotApplicable, NotChecked, NotSelected, Informational],
        // NotChecked
        [Pass, NotChecked, Error, Unknown, NotChecked, NotChecked, NotSelected, Informational],
        // NotSelected
        [Pass, NotSelected, Error, Unknown, NotSelected, NotSelected, NotSelected, Informational],
        // Informational
        [Pass, Informational, Error, Unknown, Informational, Informational, Informational, Informational],
    ];

    /// Three-valued AND (§4.1). `Fixed` operands normalize to `Pass` first.
    #[must_use]
    pub fn and(a: ResultKind, b: ResultKind) -> ResultKind {
        let (a, b) = (a.normalize(), b.normalize());
        AND_TABLE[(a.rank() - 1) as usize][(b.rank() - 1) as usize]
    }

    /// Three-valued OR (§4.1). `Fixed` operands normalize to `Pass` first.
    #[must_use]
    pub fn or(a: ResultKind, b: ResultKind) -> ResultKind {
        let (a, b) = (a.normalize(), b.normalize());
        OR_TABLE[(a.rank() - 1) as usize][(b.rank() - 1) as usize]
    }

    /// Negation applied exactly once at a check root (§4.1): `Pass` and
    /// `Fail` swap; every other kind is returned unchanged, including
    /// `Fixed` which normalizes to `Pass` first and therefore negates to
    /// `Fail`.
    #[must_use]
    pub fn negate(a: ResultKind) -> ResultKind {
        match a.normalize() {
            ResultKind::Pass => ResultKind::Fail,
            ResultKind::Fail => ResultKind::Pass,
            other => other,
        }
    }

    /// Fold a non-empty sequence of operands left-to-right with [`and`] or
    /// [`or`] depending on `op`. Panics on an empty slice; callers (the
    /// Check Evaluator) never fold zero children.
    #[must_use]
    pub fn fold(op: BoolOp, operands: &[ResultKind]) -> ResultKind {
        let mut iter = operands.iter().copied();
        let first = iter.next().expect("fold requires at least one operand");
        iter.fold(first, |acc, next| match op {
            BoolOp::And => and(acc, next),
            BoolOp::Or => or(acc, next),
        })
    }

    /// Boolean combinator for a complex check (§3, §4.7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum BoolOp {
        /// All children must combine via [`and`].
        And,
        /// Children combine via [`or`].
        Or,
    }

}
