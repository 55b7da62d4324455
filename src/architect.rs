//! The application facade: wires the pipeline stages to the configured
//! models and the persistence gateway.
//!
//! This is the only place that writes agents and runs. Stages receive the
//! oracle capability they need and nothing else.

use std::sync::Arc;

use tracing::info;

use crate::agent::{Agent, AgentDraft, AgentError};
use crate::assembler::{AssembleError, PromptAssembler};
use crate::config::{Config, OracleRole};
use crate::conversation::{Channel, ChatTurn, Responder};
use crate::discovery::{CompanyContext, DiscoveryError, SectorDiscovery};
use crate::knowledge::compiler::CompiledKnowledge;
use crate::knowledge::intake::SourceIntake;
use crate::knowledge::CandidateSource;
use crate::optimizer::{self, PromptOptimizer};
use crate::providers::{OracleError, SearchOracle, TextOracle};
use crate::simulation::runner::{RunnerModels, SimulationRunner};
use crate::simulation::{Question, RunPhase, SimulationError, TestRun};
use crate::store::{Gateway, StoreError};
use crate::summarizer::Summarizer;

/// Facade errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchitectError {
    /// Instruction assembly failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    /// Draft could not be promoted.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// Simulation failed.
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    /// Discovery or website analysis failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// An oracle call failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A referenced record does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Requested id.
        id: String,
    },
}

/// Every pipeline stage, configured.
pub struct Architect {
    summarizer: Summarizer,
    discovery: SectorDiscovery,
    assembler: PromptAssembler,
    runner: SimulationRunner,
    optimizer: PromptOptimizer,
    responder: Responder,
    gateway: Gateway,
}

impl Architect {
    /// Build every stage from `config`.
    pub fn new(
        config: &Config,
        text: Arc<dyn TextOracle>,
        search: Arc<dyn SearchOracle>,
        gateway: Gateway,
    ) -> Self {
        let model = |role| config.models.resolve(role).to_owned();
        let limits = &config.limits;
        Self {
            summarizer: Summarizer::new(
                Arc::clone(&text),
                model(OracleRole::Summarize),
                limits.max_document_chars,
            ),
            discovery: SectorDiscovery::new(
                search,
                model(OracleRole::Discover),
                model(OracleRole::DiscoverFallback),
                model(OracleRole::Analyze),
                limits.max_candidates,
            ),
            assembler: PromptAssembler::new(Arc::clone(&text), model(OracleRole::Assemble)),
            runner: SimulationRunner::new(
                Arc::clone(&text),
                RunnerModels {
                    scenarios: model(OracleRole::Scenarios),
                    answer: model(OracleRole::Answer),
                    evaluate: model(OracleRole::Evaluate),
                },
                limits.scenario_prompt_chars,
            ),
            optimizer: PromptOptimizer::new(
                Arc::clone(&text),
                model(OracleRole::Improve),
                limits.max_improve_failures,
            ),
            responder: Responder::new(text, model(OracleRole::Chat)),
            gateway,
        }
    }

    /// The persistence gateway.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// A fresh intake for a new draft.
    pub fn intake(&self) -> SourceIntake {
        SourceIntake::new(self.summarizer.clone())
    }

    /// An intake continuing an existing knowledge buffer.
    pub fn intake_with(&self, knowledge: CompiledKnowledge) -> SourceIntake {
        SourceIntake::with_knowledge(self.summarizer.clone(), knowledge)
    }

    /// Sector candidates for a company.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::Discovery`] if the primary search fails.
    pub async fn discover(
        &self,
        ctx: &CompanyContext,
    ) -> Result<Vec<CandidateSource>, ArchitectError> {
        Ok(self.discovery.discover(ctx).await?)
    }

    /// Structured company profile from a website.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::Discovery`] if the search call fails.
    pub async fn analyze_website(&self, url: &str, name: &str) -> Result<String, ArchitectError> {
        Ok(self.discovery.analyze_website(url, name).await?)
    }

    /// Assemble instructions for `draft` without saving.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::Assemble`] on a nameless draft or oracle
    /// failure.
    pub async fn assemble(
        &self,
        draft: &AgentDraft,
        sector_enriched: bool,
    ) -> Result<String, ArchitectError> {
        Ok(self
            .assembler
            .assemble(&draft.identity, &draft.rules, &draft.knowledge, sector_enriched)
            .await?)
    }

    /// Assemble, promote and persist. With `existing`, the saved agent is
    /// replaced and keeps its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError`] if assembly, promotion or storage fails.
    pub async fn build_agent(
        &self,
        draft: &AgentDraft,
        sector_enriched: bool,
        existing: Option<&Agent>,
    ) -> Result<Agent, ArchitectError> {
        let instructions = self.assemble(draft, sector_enriched).await?;
        self.save_agent(draft, &instructions, existing).await
    }

    /// Promote `draft` with already assembled `instructions` and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError`] if promotion or storage fails.
    pub async fn save_agent(
        &self,
        draft: &AgentDraft,
        instructions: &str,
        existing: Option<&Agent>,
    ) -> Result<Agent, ArchitectError> {
        let agent = draft.promote(instructions, existing)?;
        match existing {
            Some(_) => {
                if !self.gateway.agents().update(&agent).await? {
                    return Err(ArchitectError::NotFound {
                        kind: "agent",
                        id: agent.id,
                    });
                }
                info!(agent_id = %agent.id, "agent updated");
            }
            None => {
                self.gateway.agents().add(&agent).await?;
                info!(agent_id = %agent.id, name = agent.name(), "agent created");
            }
        }
        Ok(agent)
    }

    /// Load an agent or fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::NotFound`] for an unknown id.
    pub async fn agent(&self, id: &str) -> Result<Agent, ArchitectError> {
        self.gateway
            .agents()
            .get(id)
            .await?
            .ok_or_else(|| ArchitectError::NotFound {
                kind: "agent",
                id: id.to_owned(),
            })
    }

    /// Generate scenarios for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::Simulation`] if the oracle call fails.
    pub async fn generate_scenarios(
        &self,
        agent: &Agent,
        categories: &[&str],
    ) -> Result<Vec<Question>, ArchitectError> {
        Ok(self
            .runner
            .generate_scenarios(&agent.system_prompt, categories)
            .await?)
    }

    /// Run `questions` against `agent` and store the run.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError`] when there are no questions or the run
    /// cannot be stored. Individual question failures are verdicts.
    pub async fn test_agent(
        &self,
        agent: &Agent,
        questions: &[Question],
        on_phase: impl FnMut(RunPhase) + Send,
    ) -> Result<TestRun, ArchitectError> {
        let run = self
            .runner
            .run(&agent.id, &agent.system_prompt, questions, on_phase)
            .await?;
        self.gateway.runs().add(&run).await?;
        Ok(run)
    }

    /// Rewrite an agent's instructions from one of its runs and store the
    /// updated agent.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError`] for unknown ids, oracle or storage failure.
    pub async fn improve_agent(
        &self,
        agent_id: &str,
        run_id: &str,
        instruction: Option<&str>,
    ) -> Result<Agent, ArchitectError> {
        let agent = self.agent(agent_id).await?;
        let run = self
            .gateway
            .runs()
            .get(run_id)
            .await?
            .filter(|r| r.agent_id == agent.id)
            .ok_or_else(|| ArchitectError::NotFound {
                kind: "run",
                id: run_id.to_owned(),
            })?;

        let rewritten = self
            .optimizer
            .improve(&agent.system_prompt, &run.results, instruction)
            .await?;
        let updated = optimizer::apply(&agent, rewritten);
        if !self.gateway.agents().update(&updated).await? {
            return Err(ArchitectError::NotFound {
                kind: "agent",
                id: updated.id,
            });
        }
        info!(agent_id, run_id, "agent instructions improved");
        Ok(updated)
    }

    /// Reply as `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchitectError::Oracle`] if the call fails.
    pub async fn reply(
        &self,
        agent: &Agent,
        history: &[ChatTurn],
        message: &str,
        instruction: Option<&str>,
        channel: Channel,
    ) -> Result<String, ArchitectError> {
        Ok(self
            .responder
            .reply(agent, history, message, instruction, channel)
            .await?)
    }
}
