//! The rigor-enforcement state machine.
//!
//! One user turn flows through five stages, in order:
//!
//! 1. **Draft**: run the base chat model, looping through tool
//!    call/result rounds until it produces a non-empty answer with no
//!    pending tool calls.
//! 2. **Judge**: decide whether the user turn requires a
//!    truth-grounded answer. Not required: the draft stands, terminal.
//! 3. **Collect**: extract fact statements from every tool turn not
//!    yet recorded in the fact store.
//! 4. **Validate**: extract claims from the draft and keep only those
//!    consistent with the full evidence set.
//! 5. **Revise**: replace the draft with a summary of the validated
//!    claims, or a fixed refusal when nothing validated.
//!
//! The machine is linear with one conditional fork after Judge; the tool
//! loop inside Draft is a separate nested cycle bounded by
//! `max_tool_rounds`. Stages run strictly sequentially, each producing a
//! partial [`StateUpdate`] folded into the owned [`RigorState`]. Any
//! collaborator failure or strict-parse failure aborts the whole turn;
//! nothing here retries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::llm::ChatModel;
use crate::parse::{segment_statements, BooleanParser, Statement};
use crate::prompt::{bulleted_paragraph, Instruction};
use crate::state::{RigorState, StateUpdate};
use crate::tools::Tool;
use crate::turn::{find_last_turn, Role, Turn};

/// Synthetic user turn inserted before the revised answer.
pub const REVISION_REQUEST: &str = "Please revise rigorously";

/// Fixed refusal emitted when no claim survives validation.
pub const REFUSAL: &str = "Sorry, I cannot answer it rigorously...";

/// Configuration for the rigor controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum chat/tool rounds inside the Draft stage. Exceeding the
    /// cap is a collaborator error, not unbounded recursion.
    pub max_tool_rounds: u32,
    /// Validate claims concurrently. Per-claim checks share no mutable
    /// state; output order is preserved either way.
    pub parallel_validation: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            parallel_validation: false,
        }
    }
}

/// Drives one user turn through the rigor workflow.
pub struct RigorController {
    model: Arc<dyn ChatModel>,
    tools: HashMap<String, Arc<dyn Tool>>,
    config: ControllerConfig,
}

impl RigorController {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            tools: HashMap::new(),
            config: ControllerConfig::default(),
        }
    }

    /// Register a tool the Draft stage may dispatch to.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run the full state machine for the in-flight user turn.
    ///
    /// On return the final assistant turn has been appended to
    /// `state.turns`. Errors abort the turn with the state reflecting
    /// whatever stages completed.
    pub async fn run_turn(&self, state: &mut RigorState) -> Result<()> {
        if state.turns.is_empty() {
            return Err(Error::precondition("cannot run a turn on empty history"));
        }

        self.draft(state).await?;

        let update = self.judge(state).await?;
        let required = update.rigor_required.unwrap_or(false);
        state.apply(update);

        if !required {
            debug!("rigor not required, draft stands");
            return Ok(());
        }

        let update = self.collect(state).await?;
        state.apply(update);

        let update = self.validate(state).await?;
        state.apply(update);

        let update = self.revise(state).await?;
        state.apply(update);

        Ok(())
    }

    /// Draft stage: the nested chat/tool loop.
    ///
    /// The loop settles only on a non-empty answer with no pending tool
    /// calls. An empty, tool-free generation counts as a failed round
    /// and is regenerated; later stages can therefore rely on a
    /// non-empty draft being the latest assistant turn.
    async fn draft(&self, state: &mut RigorState) -> Result<()> {
        for _ in 0..self.config.max_tool_rounds {
            let turn = self.model.generate(&state.turns).await?;
            let requests = turn.tool_calls.clone();

            if requests.is_empty() {
                if turn.is_empty() {
                    debug!("empty draft with no tool calls, regenerating");
                    continue;
                }
                state.apply(StateUpdate::new().with_turn(turn));
                return Ok(());
            }

            state.apply(StateUpdate::new().with_turn(turn));
            for call in requests {
                let tool = self.tools.get(&call.name).ok_or_else(|| {
                    Error::collaborator(&call.name, "model requested an unknown tool")
                })?;
                debug!(tool = %call.name, call_id = %call.id, "invoking tool");
                let content = tool.invoke(&call.arguments).await?;
                state.apply(StateUpdate::new().with_turn(Turn::tool(content, call.id)));
            }
        }

        Err(Error::collaborator(
            "chat_model",
            format!(
                "draft did not settle within {} rounds",
                self.config.max_tool_rounds
            ),
        ))
    }

    /// Judge stage: does the triggering user turn require rigor?
    ///
    /// Strict parse: an unparseable verdict is fatal, because silently
    /// treating it as "no rigor needed" would be an unsafe default.
    async fn judge(&self, state: &RigorState) -> Result<StateUpdate> {
        let user_turn = find_last_turn(&state.turns, Role::User)
            .ok_or_else(|| Error::precondition("no user turn to judge"))?;

        let prompt = Instruction::RigorJudgment {
            query: &user_turn.content,
        }
        .render();
        let verdict = self.model.instruct(&prompt).await?;
        let required = BooleanParser::strict().parse(&verdict)?;

        info!(required, "rigor judgment");
        Ok(StateUpdate::new().with_rigor_required(required))
    }

    /// Collect stage: extract facts from tool turns not yet recorded.
    ///
    /// Idempotent on re-entry: a multi-round tool dialogue may revisit
    /// this stage, and already-recorded turns are skipped.
    async fn collect(&self, state: &RigorState) -> Result<StateUpdate> {
        let mut new_facts: HashMap<String, Vec<Statement>> = HashMap::new();

        for turn in &state.turns {
            if turn.role != Role::Tool || state.facts.is_known(&turn.id) {
                continue;
            }
            info!(turn_id = %turn.id, "extracting facts from tool turn");
            let statements = self.extract_statements(&turn.content).await?;
            new_facts.insert(turn.id.clone(), statements);
        }

        Ok(StateUpdate::new()
            .with_facts(new_facts)
            .with_facts_collected(true))
    }

    /// Validate stage: extract claims from the draft and keep those
    /// consistent with the evidence set.
    async fn validate(&self, state: &RigorState) -> Result<StateUpdate> {
        let draft = find_last_turn(&state.turns, Role::Assistant)
            .ok_or_else(|| Error::precondition("no assistant draft to validate"))?;

        let extracted = self.extract_statements(&draft.content).await?;
        info!(count = extracted.len(), "statements extracted from draft");

        let evidence = state.facts.evidence_set();
        if evidence.is_empty() {
            // No claim can be validated against zero facts.
            info!("no facts, no validated statement");
            return Ok(StateUpdate::new()
                .with_extracted_statements(extracted)
                .with_validated_statements(Vec::new()));
        }

        let facts = bulleted_paragraph(&evidence);
        let verdicts = if self.config.parallel_validation {
            self.check_claims_parallel(&extracted, &facts).await?
        } else {
            self.check_claims_sequential(&extracted, &facts).await?
        };

        let validated: Vec<Statement> = extracted
            .iter()
            .zip(&verdicts)
            .filter(|(_, passed)| **passed)
            .map(|(statement, _)| statement.clone())
            .collect();
        info!(count = validated.len(), "statements passed validation");

        Ok(StateUpdate::new()
            .with_extracted_statements(extracted)
            .with_validated_statements(validated))
    }

    /// Revise stage: summarize the validated claims, or refuse.
    async fn revise(&self, state: &RigorState) -> Result<StateUpdate> {
        let mut update = StateUpdate::new().with_turn(Turn::user(REVISION_REQUEST));

        if state.validated_statements.is_empty() {
            update = update.with_turn(Turn::assistant(REFUSAL));
        } else {
            let statements = bulleted_paragraph(&state.validated_statements);
            let prompt = Instruction::Summarization {
                statements: &statements,
            }
            .render();
            let summary = self.model.instruct(&prompt).await?;
            update = update.with_turn(Turn::assistant(summary));
        }

        // Prepare state for the next user turn.
        Ok(update
            .with_rigor_required(false)
            .with_validated_statements(Vec::new()))
    }

    async fn extract_statements(&self, text: &str) -> Result<Vec<Statement>> {
        let prompt = Instruction::StatementExtraction { input: text }.render();
        let reply = self.model.instruct(&prompt).await?;
        Ok(segment_statements(&reply))
    }

    async fn check_claim(&self, statement: &Statement, facts: &str) -> Result<bool> {
        let prompt = Instruction::ClaimValidation {
            statement: statement.text(),
            facts,
        }
        .render();
        let verdict = self.model.instruct(&prompt).await?;
        // Strict: an ambiguous verdict must not silently pass.
        BooleanParser::strict().parse(&verdict)
    }

    async fn check_claims_sequential(
        &self,
        statements: &[Statement],
        facts: &str,
    ) -> Result<Vec<bool>> {
        let mut verdicts = Vec::with_capacity(statements.len());
        for statement in statements {
            verdicts.push(self.check_claim(statement, facts).await?);
        }
        Ok(verdicts)
    }

    async fn check_claims_parallel(
        &self,
        statements: &[Statement],
        facts: &str,
    ) -> Result<Vec<bool>> {
        let checks = statements
            .iter()
            .map(|statement| self.check_claim(statement, facts));
        futures::future::join_all(checks)
            .await
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::ToolCall;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Chat model that replays scripted turns and instruction replies.
    struct ScriptedModel {
        generations: Mutex<VecDeque<Turn>>,
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(generations: Vec<Turn>, replies: Vec<&str>) -> Self {
            Self {
                generations: Mutex::new(generations.into()),
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn seen_prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate(&self, _turns: &[Turn]) -> Result<Turn> {
            self.generations
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::collaborator("scripted", "no generation scripted"))
        }

        async fn instruct(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::collaborator("scripted", "no reply scripted"))
        }
    }

    /// Tool that returns a fixed payload.
    struct FixedTool {
        payload: String,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            "web_search"
        }

        fn definition(&self) -> crate::llm::ToolDefinition {
            crate::llm::ToolDefinition {
                name: "web_search".to_string(),
                description: "fixed".to_string(),
                parameters: json!({}),
            }
        }

        async fn invoke(&self, _arguments: &Value) -> Result<String> {
            Ok(self.payload.clone())
        }
    }

    fn search_call(id: &str) -> ToolCall {
        ToolCall::new(id, "web_search", json!({"query": "eiffel tower"}))
    }

    #[tokio::test]
    async fn test_rigor_not_required_draft_stands() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("casual chat answer")],
            vec!["false"],
        ));
        let controller = RigorController::new(model.clone());

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("hi there")));
        state.validated_statements = vec![Statement::new("prior")];

        controller.run_turn(&mut state).await.unwrap();

        // Draft appended exactly once, nothing else touched.
        assert_eq!(state.turns.len(), 2);
        assert_eq!(state.turns[1].content, "casual chat answer");
        assert!(!state.rigor_required);
        assert_eq!(state.validated_statements, vec![Statement::new("prior")]);
    }

    #[tokio::test]
    async fn test_empty_evidence_always_refuses() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("the moon is made of cheese")],
            vec![
                "true",                       // judge
                "1. The moon is made of cheese", // claim extraction
            ],
        ));
        let controller = RigorController::new(model);

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("what is the moon made of?")));

        controller.run_turn(&mut state).await.unwrap();

        let last = state.turns.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, REFUSAL);

        let request = &state.turns[state.turns.len() - 2];
        assert_eq!(request.role, Role::User);
        assert_eq!(request.content, REVISION_REQUEST);

        assert!(!state.rigor_required);
        assert!(state.validated_statements.is_empty());
        // The claim was still extracted, only validation was skipped.
        assert_eq!(state.extracted_statements.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_summary_from_consistent_claim_only() {
        let model = Arc::new(ScriptedModel::new(
            vec![
                Turn::assistant("").with_tool_calls(vec![search_call("call_1")]),
                Turn::assistant("The tower is 330 meters tall and was built in 1789."),
            ],
            vec![
                "true",                                                      // judge
                "1. The tower is 330 meters tall\n2. The tower is in Paris", // facts
                "1. The tower is 330 meters tall\n2. The tower was built in 1789", // claims
                "yes",                                                       // claim 1
                "no",                                                        // claim 2
                "The tower is 330 meters tall.",                             // summary
            ],
        ));
        let controller = RigorController::new(model.clone()).with_tool(Arc::new(FixedTool {
            payload: "search results".to_string(),
        }));

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("tell me about the tower")));

        controller.run_turn(&mut state).await.unwrap();

        let last = state.turns.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "The tower is 330 meters tall.");

        // Facts were recorded under the tool turn's identity.
        assert_eq!(state.facts.len(), 1);
        assert_eq!(state.facts.evidence_set().len(), 2);

        // Both claims extracted; state reset for the next turn.
        assert_eq!(state.extracted_statements.len(), 2);
        assert!(state.validated_statements.is_empty());
        assert!(!state.rigor_required);

        // The summarization prompt only saw the consistent claim.
        let prompts = model.seen_prompts();
        let summary_prompt = prompts.last().unwrap();
        assert!(summary_prompt.contains("330 meters"));
        assert!(!summary_prompt.contains("1789"));
    }

    #[tokio::test]
    async fn test_collect_skips_recorded_tool_turns() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("draft")],
            vec![
                "true",       // judge
                "1. a claim", // claim extraction (draft)
                "true",       // claim validation
                "summary",    // summarization
            ],
        ));
        let controller = RigorController::new(model.clone());

        let mut state = RigorState::new();
        let tool_turn = Turn::tool("known content", "call_0");
        let known_id = tool_turn.id.clone();
        state.apply(
            StateUpdate::new()
                .with_turn(Turn::user("question"))
                .with_turn(tool_turn),
        );
        // Already recorded: Collect must not re-extract it.
        state
            .facts
            .record(known_id, vec![Statement::new("a known fact")]);

        controller.run_turn(&mut state).await.unwrap();

        // Only four instruction calls: no extraction over the tool turn.
        assert_eq!(model.seen_prompts().len(), 4);
        assert_eq!(state.facts.len(), 1);
        assert_eq!(state.turns.last().unwrap().content, "summary");
    }

    #[tokio::test]
    async fn test_tool_loop_bounded() {
        let looping = Turn::assistant("").with_tool_calls(vec![search_call("call_a")]);
        let model = Arc::new(ScriptedModel::new(
            vec![
                looping.clone(),
                Turn::assistant("").with_tool_calls(vec![search_call("call_b")]),
                Turn::assistant("never reached"),
            ],
            vec![],
        ));
        let controller = RigorController::new(model)
            .with_tool(Arc::new(FixedTool {
                payload: "result".to_string(),
            }))
            .with_config(ControllerConfig {
                max_tool_rounds: 2,
                parallel_validation: false,
            });

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("question")));

        let err = controller.run_turn(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("").with_tool_calls(vec![ToolCall::new(
                "call_1",
                "no_such_tool",
                json!({}),
            )])],
            vec![],
        ));
        let controller = RigorController::new(model);

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("question")));

        let err = controller.run_turn(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_judgment_is_fatal() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("draft")],
            vec!["it depends on what you mean"],
        ));
        let controller = RigorController::new(model);

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("question")));

        let err = controller.run_turn(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_empty_draft_is_regenerated() {
        // An empty, tool-free generation is a failed round: it is not
        // appended to history and the model is asked again.
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant(""), Turn::assistant("real answer")],
            vec!["false"],
        ));
        let controller = RigorController::new(model);

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("question")));

        controller.run_turn(&mut state).await.unwrap();

        assert_eq!(state.turns.len(), 2);
        assert_eq!(state.turns[1].content, "real answer");
    }

    #[tokio::test]
    async fn test_persistently_empty_drafts_exhaust_rounds() {
        let model = Arc::new(ScriptedModel::new(
            vec![
                Turn::assistant(""),
                Turn::assistant("  "),
                Turn::assistant("never reached"),
            ],
            vec![],
        ));
        let controller = RigorController::new(model).with_config(ControllerConfig {
            max_tool_rounds: 2,
            parallel_validation: false,
        });

        let mut state = RigorState::new();
        state.apply(StateUpdate::new().with_turn(Turn::user("question")));

        let err = controller.run_turn(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
        // No empty draft leaked into the history.
        assert_eq!(state.turns.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_history_is_a_precondition_error() {
        let model = Arc::new(ScriptedModel::new(vec![], vec![]));
        let controller = RigorController::new(model);

        let mut state = RigorState::new();
        let err = controller.run_turn(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[tokio::test]
    async fn test_parallel_validation_preserves_order() {
        let model = Arc::new(ScriptedModel::new(
            vec![Turn::assistant("a and b and c")],
            vec![
                "true",               // judge
                "1. a\n2. b\n3. c",   // claim extraction
                "true",               // a
                "false",              // b
                "true",               // c
                "a c summary",        // summarization
            ],
        ));
        let controller = RigorController::new(model.clone()).with_config(ControllerConfig {
            max_tool_rounds: 8,
            parallel_validation: true,
        });

        let mut state = RigorState::new();
        let tool_turn = Turn::tool("evidence", "call_0");
        state.apply(
            StateUpdate::new()
                .with_turn(Turn::user("question"))
                .with_turn(tool_turn.clone()),
        );
        state
            .facts
            .record(tool_turn.id, vec![Statement::new("a"), Statement::new("c")]);

        controller.run_turn(&mut state).await.unwrap();

        // Collect skipped the recorded turn, so the validation replies
        // line up with claims a, b, c in order.
        let summary_prompt = model.seen_prompts().last().unwrap().clone();
        assert!(summary_prompt.contains("* a\n* c"));
    }
}
