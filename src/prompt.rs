//! Fixed instruction templates for single-shot collaborator calls.
//!
//! Each workflow stage that consults the model does so through one of
//! these templates; the base chat stage goes through the model directly
//! with no template. The wording is deliberately blunt: templates that
//! feed the boolean parser demand a bare "true"/"false" answer, and the
//! summarization template forbids introducing information not present in
//! its input statements.

use crate::parse::Statement;

/// A rendered single-shot instruction for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Does the user query require a truth-grounded, rigorous answer?
    RigorJudgment { query: &'a str },
    /// Break a block of text into atomic statements, one per line.
    StatementExtraction { input: &'a str },
    /// Is a single statement consistent with all of the given facts?
    ClaimValidation {
        statement: &'a str,
        facts: &'a str,
    },
    /// Summarize validated statements without adding information.
    Summarization { statements: &'a str },
}

impl Instruction<'_> {
    /// Render the instruction into a prompt string.
    pub fn render(&self) -> String {
        match self {
            Self::RigorJudgment { query } => format!(
                "You'll need to decide whether the user query or request requires \
                 rigorous reasoning and must be answered with truth. You must simply \
                 answer \"true\" or \"false\". No explanation of your answer.\n\n\
                 User Query:\n{query}\n"
            ),
            Self::StatementExtraction { input } => format!(
                "Break the following text into a list of short, atomic, self-contained \
                 statements. Each statement must stand on its own without referring to \
                 the others. Write one statement per line as a numbered list. \
                 No explanation.\n\n\
                 Text:\n{input}\n"
            ),
            Self::ClaimValidation { statement, facts } => format!(
                "You'll need to decide whether the statement below is consistent with \
                 all of the given facts. If the list of facts is empty, or the statement \
                 violates any one of the facts, you must answer \"false\". Otherwise \
                 answer \"true\". No explanation of your answer.\n\n\
                 Facts:\n{facts}\n\n\
                 Statement:\n{statement}\n"
            ),
            Self::Summarization { statements } => format!(
                "Summarize the following statements into a single coherent answer. \
                 You must not introduce any information that is not present in the \
                 statements.\n\n\
                 Statements:\n{statements}\n"
            ),
        }
    }
}

/// Encode statements as a bulleted paragraph, one `* ` line each, for
/// embedding in a prompt.
pub fn bulleted_paragraph(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(|statement| format!("* {statement}"))
        .collect::<Vec<_>>()
        .join("\n")
}
