//! The agentic retrieval-and-reasoning workflow
//!
//! - [`config`]: `WorkflowConfig` and per-node settings
//! - [`prompts`]: system prompts
//! - [`nodes`]: plan, search, summarize, judge and answer
//! - [`engine`]: the state machine and thread-keyed runs
//! - [`events`]: progress reporting

pub mod config;
pub mod engine;
pub mod events;
pub mod nodes;
pub mod prompts;

pub use config::{NodeSettings, RetrievalSettings, WorkflowConfig};
pub use engine::{next_step, WorkflowEngine, WorkflowStep};
pub use events::{event_channel, EventReceiver, EventSender, WorkflowEvent};
pub use nodes::{JudgeResult, NodeContext, PlanningResult, WorkflowNode};
pub use prompts::Prompts;
