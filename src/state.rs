//! Workflow state threaded through the rigor controller.
//!
//! Each controller stage returns a partial [`StateUpdate`]; the session
//! folds updates into the [`RigorState`] it owns. How each field merges
//! is declared once in [`StateField::merge_strategy`] rather than ad hoc
//! at every call site: the turn sequence appends, the fact collection
//! merges by source key, and everything else is replaced wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::facts::FactStore;
use crate::parse::Statement;
use crate::turn::Turn;

/// How a state field folds an incoming partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// The new value overwrites the old one.
    Replace,
    /// New items are appended to the existing sequence.
    Append,
    /// New entries are merged into the existing mapping, overwriting
    /// per key.
    UnionOfMaps,
}

/// The fields of [`RigorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    RigorRequired,
    Turns,
    Facts,
    FactsCollected,
    ExtractedStatements,
    ValidatedStatements,
}

impl StateField {
    /// The merge policy for this field. [`RigorState::apply`] implements
    /// exactly this table.
    pub fn merge_strategy(self) -> MergeStrategy {
        match self {
            Self::RigorRequired => MergeStrategy::Replace,
            Self::Turns => MergeStrategy::Append,
            Self::Facts => MergeStrategy::UnionOfMaps,
            Self::FactsCollected => MergeStrategy::Replace,
            Self::ExtractedStatements => MergeStrategy::Replace,
            Self::ValidatedStatements => MergeStrategy::Replace,
        }
    }
}

/// The mutable workflow record for one in-flight user request.
///
/// Created fresh per conversation, mutated exclusively through
/// [`RigorState::apply`], owned by the session for the lifetime of the
/// request. Never shared across concurrent requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigorState {
    /// Whether the triggering user turn requires a truth-grounded answer.
    pub rigor_required: bool,
    /// Append-only, order-preserving conversation history.
    pub turns: Vec<Turn>,
    /// Facts extracted from tool turns, keyed by source-turn identity.
    pub facts: FactStore,
    /// Whether fact collection has run for the current request.
    pub facts_collected: bool,
    /// Claims pulled from the latest draft answer. Overwritten each
    /// revalidation, never merged.
    pub extracted_statements: Vec<Statement>,
    /// The subset of `extracted_statements` confirmed by the evidence
    /// set. Overwritten each revalidation.
    pub validated_statements: Vec<Statement>,
}

impl RigorState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a partial update into the state, field by field, following
    /// the [`StateField::merge_strategy`] table.
    pub fn apply(&mut self, update: StateUpdate) {
        // Replace
        if let Some(rigor_required) = update.rigor_required {
            self.rigor_required = rigor_required;
        }
        if let Some(facts_collected) = update.facts_collected {
            self.facts_collected = facts_collected;
        }
        if let Some(extracted) = update.extracted_statements {
            self.extracted_statements = extracted;
        }
        if let Some(validated) = update.validated_statements {
            self.validated_statements = validated;
        }

        // Append
        self.turns.extend(update.turns);

        // Union of maps
        if !update.facts.is_empty() {
            self.facts.merge(update.facts);
        }
    }

    /// The most recent turn, if any.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// A partial update to [`RigorState`], produced by one controller stage.
///
/// Unset fields leave the state untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub rigor_required: Option<bool>,
    pub turns: Vec<Turn>,
    pub facts: HashMap<String, Vec<Statement>>,
    pub facts_collected: Option<bool>,
    pub extracted_statements: Option<Vec<Statement>>,
    pub validated_statements: Option<Vec<Statement>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rigor_required(mut self, required: bool) -> Self {
        self.rigor_required = Some(required);
        self
    }

    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn with_facts(mut self, facts: HashMap<String, Vec<Statement>>) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_facts_collected(mut self, collected: bool) -> Self {
        self.facts_collected = Some(collected);
        self
    }

    pub fn with_extracted_statements(mut self, statements: Vec<Statement>) -> Self {
        self.extracted_statements = Some(statements);
        self
    }

    pub fn with_validated_statements(mut self, statements: Vec<Statement>) -> Self {
        self.validated_statements = Some(statements);
        self
    }
}
