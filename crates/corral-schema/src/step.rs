use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A lifecycle step from the fixed vocabulary.
///
/// The set is closed: configuration naming anything else fails to parse, so a
/// misspelled step never reaches dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Dependency,
    Cleanup,
    Destroy,
    Syntax,
    Create,
    Prepare,
    Converge,
    Idempotence,
    SideEffect,
    Verify,
}

/// Default sequence of `corral test`.
pub const TEST_SEQUENCE: [Step; 12] = [
    Step::Dependency,
    Step::Cleanup,
    Step::Destroy,
    Step::Syntax,
    Step::Create,
    Step::Prepare,
    Step::Converge,
    Step::Idempotence,
    Step::SideEffect,
    Step::Verify,
    Step::Cleanup,
    Step::Destroy,
];

impl Step {
    pub const ALL: [Step; 10] = [
        Step::Dependency,
        Step::Cleanup,
        Step::Destroy,
        Step::Syntax,
        Step::Create,
        Step::Prepare,
        Step::Converge,
        Step::Idempotence,
        Step::SideEffect,
        Step::Verify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Dependency => "dependency",
            Step::Cleanup => "cleanup",
            Step::Destroy => "destroy",
            Step::Syntax => "syntax",
            Step::Create => "create",
            Step::Prepare => "prepare",
            Step::Converge => "converge",
            Step::Idempotence => "idempotence",
            Step::SideEffect => "side_effect",
            Step::Verify => "verify",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownStep(s.to_owned()))
    }
}
