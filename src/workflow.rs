//! Workflow and step identifiers.
//!
//! Every template lookup and output path is resolved from a [`Stage`], so the
//! single-step / multi-step split is an exhaustive `match` rather than a
//! branch on whether an optional step number happens to be present.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// One model call extracts every record. (default)
    #[default]
    SingleStep,
    /// Four chained model calls; steps 2 and 3 see the previous step's output.
    MultiStep,
}

impl Workflow {
    /// Directory / file name used on disk (`single_step`, `multi_step`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::SingleStep => "single_step",
            Workflow::MultiStep => "multi_step",
        }
    }

    /// The stages of this workflow in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            Workflow::SingleStep => vec![Stage::SingleStep],
            Workflow::MultiStep => Step::ALL.iter().map(|s| Stage::MultiStep(*s)).collect(),
        }
    }

    /// The stage whose output is converted to JSONL.
    pub fn final_stage(&self) -> Stage {
        match self {
            Workflow::SingleStep => Stage::SingleStep,
            Workflow::MultiStep => Stage::MultiStep(Step::Three),
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "single_step" | "single" => Ok(Workflow::SingleStep),
            "multi_step" | "multi" => Ok(Workflow::MultiStep),
            other => Err(format!(
                "unknown workflow '{other}': expected 'single_step' or 'multi_step'"
            )),
        }
    }
}

/// One stage of the multi-step workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Zero,
    One,
    Two,
    Three,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 4] = [Step::Zero, Step::One, Step::Two, Step::Three];

    /// Numeric index used in template and output file names.
    pub fn index(&self) -> u8 {
        match self {
            Step::Zero => 0,
            Step::One => 1,
            Step::Two => 2,
            Step::Three => 3,
        }
    }

    /// The step whose saved output is fed into this one.
    ///
    /// Steps 0 and 1 both read only the document; the chain starts at step 2.
    pub fn chained_input(&self) -> Option<Step> {
        match self {
            Step::Zero | Step::One => None,
            Step::Two => Some(Step::One),
            Step::Three => Some(Step::Two),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A single model call: the only stage of `single_step`, or one of the four
/// `multi_step` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    SingleStep,
    MultiStep(Step),
}

impl Stage {
    pub fn workflow(&self) -> Workflow {
        match self {
            Stage::SingleStep => Workflow::SingleStep,
            Stage::MultiStep(_) => Workflow::MultiStep,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Stage::SingleStep => None,
            Stage::MultiStep(step) => Some(*step),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SingleStep => f.write_str("single_step"),
            Stage::MultiStep(step) => write!(f, "multi_step/step_{step}"),
        }
    }
}
