//! Progress events
//!
//! An optional unbounded channel the engine and nodes report to while a run
//! is in flight. Sending never blocks, and a dropped receiver is ignored.

use std::fmt;
use tokio::sync::mpsc;

use super::engine::WorkflowStep;
use crate::state::Subtask;

pub type EventSender = mpsc::UnboundedSender<WorkflowEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<WorkflowEvent>;

/// Create a progress channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A step is about to run
    StepStarted { step: WorkflowStep },

    /// The planner produced subtasks
    Planned {
        subtasks: Vec<Subtask>,
        fallback: bool,
    },

    /// Retrieval finished for the pending subtasks
    Searched {
        new_blocks: usize,
        total_blocks: usize,
    },

    /// Summary replaced
    Summarized { chars: usize, fallback: bool },

    /// Reasoning trace the model returned alongside a step's output
    Thinking { step: WorkflowStep, trace: String },

    /// Sufficiency verdict after validation
    Judged {
        sufficient: bool,
        reason: String,
        loop_count: u32,
        follow_up: usize,
    },

    /// One streamed answer fragment
    AnswerDelta { text: String },

    /// The run reached `Done`
    Finished { answer: String },
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepStarted { step } => write!(f, "▶ {}", step),
            Self::Planned { subtasks, fallback } => {
                let label = if *fallback { " (fallback)" } else { "" };
                write!(f, "planned {} subtask(s){}", subtasks.len(), label)?;
                for subtask in subtasks {
                    write!(
                        f,
                        "\n  - {} [{}]",
                        subtask.purpose,
                        subtask.queries.join(" | ")
                    )?;
                }
                Ok(())
            }
            Self::Searched {
                new_blocks,
                total_blocks,
            } => write!(
                f,
                "retrieved {} new block(s), {} total",
                new_blocks, total_blocks
            ),
            Self::Summarized { chars, fallback } => {
                let label = if *fallback { " (raw results)" } else { "" };
                write!(f, "summary: {} chars{}", chars, label)
            }
            Self::Thinking { step, trace } => write!(f, "{} reasoning:\n{}", step, trace.trim()),
            Self::Judged {
                sufficient,
                reason,
                loop_count,
                follow_up,
            } => {
                let verdict = if *sufficient { "sufficient" } else { "insufficient" };
                write!(f, "judge #{}: {} ({})", loop_count, verdict, reason)?;
                if *follow_up > 0 {
                    write!(f, ", {} follow-up subtask(s)", follow_up)?;
                }
                Ok(())
            }
            Self::AnswerDelta { text } => write!(f, "{}", text),
            Self::Finished { answer } => write!(f, "done ({} chars)", answer.chars().count()),
        }
    }
}
