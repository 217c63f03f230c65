//! System prompts for each LLM-backed node

use serde::{Deserialize, Serialize};

const PLANNER_PROMPT: &str = "\
You are a research planner.
Break the user's question into subtasks for searching a knowledge base of technical documents.

Create at most 3 subtasks.
Each purpose is later used to judge whether enough information was found, so state it concretely and unambiguously.
Each query should be a specific phrase likely to appear in the relevant documents.";

const SUMMARIZE_PROMPT: &str = "\
You summarize search results.
Condense the search results below to the information needed to answer the user's question.

Rules:
- Organize the main findings as bullet points under each [Purpose] header.
- Keep numbers, proper nouns and technical terms exact.
- If a purpose lacks information, say \"insufficient information\" for it.
- Keep the whole summary under 800 characters.";

const JUDGE_PROMPT: &str = "\
You assess research quality.
Given the user's question and a summary of the search results, decide whether there is enough information to answer.

If sufficient is true, answer generation starts.
If sufficient is false, provide additional_subtasks covering the purposes that still lack information.";

const ANSWER_PROMPT: &str = "\
You are an assistant answering from research results.
Answer the user's question carefully using the search results.
Base the answer only on the search results and leave out anything they do not contain.
End the answer with a conclusion in this format:

# Conclusion
- Question: (the question)
- Answer: (a concise answer)";

const USER_DEFAULT_PROMPT: &str = "Answer in the language of the question.";

/// Prompt set used by the nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub planner: String,
    pub summarize: String,
    pub judge: String,
    pub answer: String,
    /// User-editable instruction prepended to the answer prompt
    pub user_default: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            planner: PLANNER_PROMPT.to_string(),
            summarize: SUMMARIZE_PROMPT.to_string(),
            judge: JUDGE_PROMPT.to_string(),
            answer: ANSWER_PROMPT.to_string(),
            user_default: USER_DEFAULT_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    pub fn with_user_default(mut self, prompt: impl Into<String>) -> Self {
        self.user_default = prompt.into();
        self
    }

    /// System prompt for the answer node
    pub fn answer_system(&self) -> String {
        if self.user_default.trim().is_empty() {
            self.answer.clone()
        } else {
            format!("{}\n\n{}", self.user_default, self.answer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_system_prepends_user_default() {
        let prompts = Prompts::default().with_user_default("Be brief.");
        let system = prompts.answer_system();
        assert!(system.starts_with("Be brief.\n\n"));
        assert!(system.ends_with(&prompts.answer));
    }

    #[test]
    fn test_answer_system_without_user_default() {
        let prompts = Prompts::default().with_user_default("  ");
        assert_eq!(prompts.answer_system(), prompts.answer);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let prompts: Prompts = serde_json::from_str(r#"{"judge": "custom"}"#).unwrap();
        assert_eq!(prompts.judge, "custom");
        assert_eq!(prompts.planner, Prompts::default().planner);
    }
}
