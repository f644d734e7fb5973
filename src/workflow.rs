//! Credit-gated generation: check credit, call the gateway, persist the
//! artifact on success, refund on failure.
//!
//! Every invocation starts from `Idle` and ends in `Succeeded` or `Failed`;
//! nothing carries over between runs except what the stores hold.

use std::fmt;

use serde::Serialize;

use crate::config::GenerationConfig;
use crate::db::models::{Account, Artifact};
use crate::error::{AppError, AppResult};
use crate::gateway::{self, CodeGenerator, GatewayError, SYSTEM_INSTRUCTIONS};
use crate::ledger::{self, Consumption};
use crate::state::DbPool;
use crate::store::artifacts::{self, NewArtifact};

const DEFAULT_NAME: &str = "AI Generated App";
const DEMO_NAME: &str = "Sample App";
const DESCRIPTION_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    CreditChecked,
    Generating,
    Succeeded,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InsufficientCredit,
    GatewayFailure(String),
    Storage(String),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => write!(f, "idle"),
            WorkflowState::CreditChecked => write!(f, "credit-checked"),
            WorkflowState::Generating => write!(f, "generating"),
            WorkflowState::Succeeded => write!(f, "succeeded"),
            WorkflowState::Failed(reason) => write!(f, "failed({:?})", reason),
        }
    }
}

/// One click of "generate".
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    /// Caller's own API key; makes the run unmetered.
    pub api_key: Option<String>,
}

/// Repair request: code that failed and the error it produced.
#[derive(Debug, Clone, Default)]
pub struct FixRequest {
    pub prompt: String,
    pub code: String,
    pub error: String,
    pub name: Option<String>,
    pub is_public: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub artifact: Artifact,
    /// True when the canned demo was served instead of a real generation.
    pub demo: bool,
}

/// Dependencies of one run, passed explicitly per request.
pub struct Workflow<'a> {
    pub db: &'a DbPool,
    pub generator: &'a dyn CodeGenerator,
    pub config: &'a GenerationConfig,
}

/// State of a single invocation, with its transition history.
struct Run {
    state: WorkflowState,
    history: Vec<WorkflowState>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            history: vec![WorkflowState::Idle],
        }
    }

    fn advance(&mut self, account_id: &str, next: WorkflowState) {
        tracing::debug!(account_id, from = %self.state, to = %next, "Workflow transition");
        self.history.push(next.clone());
        self.state = next;
    }
}

/// Terminal outcome of a run; the history is kept for callers that want to
/// audit the path taken.
pub struct RunReport {
    pub result: AppResult<Generated>,
    pub history: Vec<WorkflowState>,
}

impl<'a> Workflow<'a> {
    pub fn new(db: &'a DbPool, generator: &'a dyn CodeGenerator, config: &'a GenerationConfig) -> Self {
        Self {
            db,
            generator,
            config,
        }
    }

    pub async fn generate(&self, account: &Account, request: GenerationRequest) -> AppResult<Generated> {
        self.generate_traced(account, request).await.result
    }

    /// Re-run generation with the failing code and error folded into the prompt.
    pub async fn fix(&self, account: &Account, request: FixRequest) -> AppResult<Generated> {
        if request.code.trim().is_empty() || request.error.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Both the failing code and the error are required".into(),
            ));
        }
        let augmented = gateway::fix_prompt(&request.prompt, &request.code, &request.error);
        let name = fixed_name(request.name.as_deref());

        let stored = GenerationRequest {
            description: Some(describe(&request.prompt, &request.error)),
            prompt: request.prompt,
            name: Some(name),
            is_public: request.is_public,
            api_key: request.api_key,
        };
        self.run(account, stored, Some(augmented)).await.result
    }

    pub async fn generate_traced(&self, account: &Account, request: GenerationRequest) -> RunReport {
        self.run(account, request, None).await
    }

    /// `gateway_prompt` replaces the stored prompt as the text sent to the
    /// generator; the artifact always keeps the caller's own prompt.
    async fn run(
        &self,
        account: &Account,
        request: GenerationRequest,
        gateway_prompt: Option<String>,
    ) -> RunReport {
        let mut run = Run::new();
        let result = self.drive(&mut run, account, request, gateway_prompt).await;
        RunReport {
            result,
            history: run.history,
        }
    }

    async fn drive(
        &self,
        run: &mut Run,
        account: &Account,
        request: GenerationRequest,
        gateway_prompt: Option<String>,
    ) -> AppResult<Generated> {
        let prompt = request.prompt.trim();
        let sent = gateway_prompt.as_deref().map(str::trim).unwrap_or(prompt);
        if sent.is_empty() {
            return Err(AppError::BadRequest("Prompt is required".into()));
        }

        let api_key = request
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if api_key.is_none() && !self.generator.has_credential() && self.config.demo_fallback {
            tracing::info!(account_id = %account.id, "No API key configured, serving demo artifact");
            run.advance(&account.id, WorkflowState::Generating);
            return self
                .persist(run, account, &request, prompt, gateway::DEMO_CODE, None, true)
                .map(|artifact| Generated {
                    artifact,
                    demo: true,
                });
        }

        // Bring-your-own-key runs are never charged
        let consumption = if api_key.is_some() {
            Consumption::Unmetered
        } else {
            ledger::try_consume(self.db, &account.id, self.config.cost_per_generation)?
        };

        if !consumption.granted() {
            run.advance(&account.id, WorkflowState::Failed(FailureReason::InsufficientCredit));
            return Err(AppError::InsufficientCredit);
        }
        run.advance(&account.id, WorkflowState::CreditChecked);

        run.advance(&account.id, WorkflowState::Generating);
        let code = match self.generator.generate(SYSTEM_INSTRUCTIONS, sent, api_key).await {
            Ok(code) if code.is_empty() => Err(GatewayError::MalformedResponse(
                "empty completion".into(),
            )),
            other => other,
        };

        let code = match code {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!(account_id = %account.id, error = %e, "Generation failed");
                run.advance(
                    &account.id,
                    WorkflowState::Failed(FailureReason::GatewayFailure(e.to_string())),
                );
                self.refund_if_charged(&account.id, consumption);
                return Err(AppError::Gateway(e));
            }
        };

        let artifact = self.persist(run, account, &request, prompt, &code, Some(consumption), false)?;
        Ok(Generated {
            artifact,
            demo: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        run: &mut Run,
        account: &Account,
        request: &GenerationRequest,
        prompt: &str,
        code: &str,
        consumption: Option<Consumption>,
        demo: bool,
    ) -> AppResult<Artifact> {
        let default_name = if demo { DEMO_NAME } else { DEFAULT_NAME };
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(default_name);
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| truncate(prompt, DESCRIPTION_CHARS));

        let stored = artifacts::create(
            self.db,
            &NewArtifact {
                owner_id: &account.id,
                name,
                description: &description,
                prompt,
                code,
                is_public: request.is_public,
            },
        )
        .and_then(|id| {
            artifacts::get_by_id(self.db, &id)?
                .ok_or_else(|| AppError::Internal(format!("artifact {} missing after insert", id)))
        });

        match stored {
            Ok(artifact) => {
                run.advance(&account.id, WorkflowState::Succeeded);
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Failed to store artifact");
                run.advance(
                    &account.id,
                    WorkflowState::Failed(FailureReason::Storage(e.to_string())),
                );
                if let Some(consumption) = consumption {
                    self.refund_if_charged(&account.id, consumption);
                }
                Err(e)
            }
        }
    }

    /// Compensate a charged run. A refund failure is logged, not surfaced:
    /// the caller already has a more relevant error to report.
    fn refund_if_charged(&self, account_id: &str, consumption: Consumption) {
        if consumption != Consumption::Charged {
            return;
        }
        if let Err(e) = ledger::refund(self.db, account_id, self.config.cost_per_generation) {
            tracing::error!(account_id, error = %e, "Refund failed");
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

const FIXED_SUFFIX: &str = " (fixed)";

/// Name for a repaired artifact: the given name (or the default) marked as
/// fixed, without stacking the marker on repeated fixes.
fn fixed_name(name: Option<&str>) -> String {
    let base = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);
    if base.ends_with(FIXED_SUFFIX) {
        base.to_string()
    } else {
        format!("{}{}", base, FIXED_SUFFIX)
    }
}

fn describe(prompt: &str, error: &str) -> String {
    let base = if prompt.trim().is_empty() {
        error.lines().next().unwrap_or_default()
    } else {
        prompt.trim()
    };
    truncate(base, DESCRIPTION_CHARS)
}
