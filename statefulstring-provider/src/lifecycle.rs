//! Create, diff, update and check for `StatefulString`, on typed values.
//!
//! These are pure functions of their arguments. Prior state always comes in
//! explicitly, so nothing here is kept between calls.

use std::collections::BTreeMap;

use statefulstring_resource::schema::v0::CheckFailure;

use crate::diff::{compute_diff, ChangeKind};
use crate::resource::{StatefulStringArgs, StatefulStringState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub has_changes: bool,
    pub detailed_diff: BTreeMap<String, ChangeKind>,
}

pub struct StatefulString {}

impl StatefulString {
    /// The id is the resource name; the state is the input, as is.
    pub fn create(&self, name: &str, input: StatefulStringArgs) -> (String, StatefulStringState) {
        (name.to_string(), StatefulStringState::from(input))
    }

    pub fn diff(&self, old: &StatefulStringState, new: &StatefulStringArgs) -> DiffReport {
        let verdict = compute_diff(old, new);
        DiffReport {
            has_changes: verdict.any_trigger_changed,
            detailed_diff: verdict.detailed_diff(),
        }
    }

    pub fn update(&self, old: &StatefulStringState, new: &StatefulStringArgs) -> StatefulStringState {
        compute_diff(old, new).resulting_input.into()
    }

    /// Typed inputs are already well-formed; there are no further rules.
    pub fn check(&self, new: StatefulStringArgs) -> (StatefulStringArgs, Vec<CheckFailure>) {
        (new, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeKind::*;
    use crate::resource::args;

    #[test]
    fn create_is_verbatim() {
        let input = args("hello, world", &[("foo", "bar")]);
        let (id, state) = StatefulString {}.create("StatefulString", input.clone());
        assert_eq!(id, "StatefulString");
        assert_eq!(state.as_input(), input);
    }

    #[test]
    fn update_scenarios() {
        struct Case {
            name: &'static str,
            initial: StatefulStringArgs,
            updated: StatefulStringArgs,
            expected: StatefulStringArgs,
        }
        let cases = [
            Case {
                name: "No string change with no trigger change",
                initial: args("hello, world", &[("foo", "bar")]),
                updated: args("hello, world", &[("foo", "bar")]),
                expected: args("hello, world", &[("foo", "bar")]),
            },
            Case {
                name: "String change with no trigger change",
                initial: args("hello, world", &[("foo", "bar")]),
                updated: args("2", &[("foo", "bar")]),
                expected: args("hello, world", &[("foo", "bar")]),
            },
            Case {
                name: "String change with trigger value change",
                initial: args("hello, world", &[("foo", "bar")]),
                updated: args("2", &[("foo", "bar2")]),
                expected: args("2", &[("foo", "bar2")]),
            },
            Case {
                name: "No string change with trigger value change",
                initial: args("1", &[("foo", "bar")]),
                updated: args("1", &[("foo", "bar2")]),
                expected: args("1", &[("foo", "bar2")]),
            },
            Case {
                name: "No string change with trigger key add",
                initial: args("1", &[("foo", "bar")]),
                updated: args("1", &[("foo", "bar"), ("foo2", "bar2")]),
                expected: args("1", &[("foo", "bar"), ("foo2", "bar2")]),
            },
            Case {
                name: "String change with trigger key add",
                initial: args("1", &[("foo", "bar")]),
                updated: args("2", &[("foo", "bar"), ("foo2", "bar2")]),
                expected: args("2", &[("foo", "bar"), ("foo2", "bar2")]),
            },
            Case {
                name: "String change with trigger key remove",
                initial: args("1", &[("foo", "bar"), ("foo2", "bar2")]),
                updated: args("2", &[("foo", "bar")]),
                expected: args("2", &[("foo", "bar")]),
            },
            Case {
                name: "String change with trigger key remove and trigger value change",
                initial: args("1", &[("foo", "bar"), ("foo2", "bar2")]),
                updated: args("2", &[("foo", "bar2")]),
                expected: args("2", &[("foo", "bar2")]),
            },
        ];

        let resource = StatefulString {};
        for case in cases {
            let (_, state) = resource.create("StatefulString", case.initial);
            let updated = resource.update(&state, &case.updated);
            assert_eq!(updated.as_input(), case.expected, "{}", case.name);
        }
    }

    #[test]
    fn diff_scenarios() {
        let base = &[("foo", "bar"), ("foo2", "bar2")];
        let cases: [(&str, StatefulStringArgs, StatefulStringArgs, &[(&str, ChangeKind)]); 8] = [
            ("String Same, Triggers Same", args("1", base), args("1", base), &[]),
            ("String Change, Triggers Same", args("1", base), args("2", base), &[]),
            (
                "String Change, Triggers Change Value",
                args("1", base),
                args("2", &[("foo", "bar"), ("foo2", "bar3")]),
                &[("string", Updated), ("triggers.foo2", Updated)],
            ),
            (
                "String Change, Triggers Delete Key",
                args("1", base),
                args("2", &[("foo", "bar")]),
                &[("string", Updated), ("triggers.foo2", Removed)],
            ),
            (
                "String Change, Triggers Add Key",
                args("1", &[("foo", "bar")]),
                args("2", base),
                &[("string", Updated), ("triggers.foo2", Added)],
            ),
            (
                "String Same, Triggers Change Value",
                args("1", base),
                args("1", &[("foo", "bar"), ("foo2", "bar3")]),
                &[("triggers.foo2", Updated)],
            ),
            (
                "String Same, Triggers Add and Delete Key",
                args("1", base),
                args("1", &[("foo", "bar"), ("foo3", "bar3")]),
                &[("triggers.foo2", Removed), ("triggers.foo3", Added)],
            ),
            (
                "String Same, Triggers Add and Delete Key and Update Value",
                args("1", base),
                args("1", &[("foo", "barX"), ("foo3", "bar3")]),
                &[
                    ("triggers.foo", Updated),
                    ("triggers.foo2", Removed),
                    ("triggers.foo3", Added),
                ],
            ),
        ];

        let resource = StatefulString {};
        for (name, initial, updated, expected) in cases {
            let report = resource.diff(&initial.into(), &updated);
            let expected: BTreeMap<String, ChangeKind> =
                expected.iter().map(|(p, k)| (p.to_string(), *k)).collect();
            assert_eq!(report.has_changes, !expected.is_empty(), "{}", name);
            assert_eq!(report.detailed_diff, expected, "{}", name);
        }
    }

    #[test]
    fn diff_against_own_state_is_empty() {
        let resource = StatefulString {};
        let (_, state) = resource.create("s", args("x", &[("a", "1"), ("b", "2")]));
        let report = resource.diff(&state, &state.as_input());
        assert!(!report.has_changes);
        assert!(report.detailed_diff.is_empty());
    }

    #[test]
    fn check_is_identity() {
        let input = args("1", &[("foo", "barX"), ("foo3", "bar3")]);
        let (normalized, failures) = StatefulString {}.check(input.clone());
        assert_eq!(normalized, input);
        assert!(failures.is_empty());
    }
}
