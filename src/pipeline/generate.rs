//! Bounded-attempt JSON generation with model self-repair.
//!
//! Every model call in the pipeline goes through [`generate_json`]. Each
//! attempt runs the gateway, recovers a JSON span, and checks it parses.
//! The first parse success wins. A parse *failure* transitions the attempt
//! state from [`Attempt::Initial`] to [`Attempt::Repair`]: the next call
//! sends only a fixed repair instruction plus the invalid text. The
//! original images and context are discarded on purpose; repair is a pure
//! text-to-text correction step.
//!
//! Observability is a required side channel, not optional logging: after
//! every gateway call, regardless of outcome, the run's cumulative token
//! usage and the per-call metadata are emitted to the progress sink.

use crate::error::ExtractError;
use crate::gateway::PromptPart;
use crate::pipeline::json::extract_json;
use crate::pipeline::RunContext;
use crate::progress::ModelCallEvent;
use crate::prompts::REPAIR_INSTRUCTION;
use std::time::Instant;
use tracing::{debug, warn};

/// The two-state retry machine. `Initial` carries the caller's full prompt
/// (instruction, markers, images); `Repair` carries only the repair prompt.
/// The transition Initial→Repair fires on a JSON parse failure and is
/// one-way; empty output re-runs whichever state is current.
enum Attempt {
    Initial(Vec<PromptPart>),
    Repair(Vec<PromptPart>),
}

impl Attempt {
    fn parts(&self) -> &[PromptPart] {
        match self {
            Attempt::Initial(parts) | Attempt::Repair(parts) => parts,
        }
    }

    fn is_repair(&self) -> bool {
        matches!(self, Attempt::Repair(_))
    }
}

/// Drive the gateway until it yields parseable JSON or the attempt budget
/// is exhausted.
///
/// Returns the recovered JSON text on success, `Ok(None)` after
/// `max_attempts` attempts without a valid parse. Gateway transport errors
/// propagate; empty output and malformed JSON only consume attempts.
pub async fn generate_json(
    ctx: &mut RunContext<'_>,
    stage: &str,
    parts: Vec<PromptPart>,
    max_attempts: u32,
) -> Result<Option<String>, ExtractError> {
    let mut state = Attempt::Initial(parts);

    for attempt in 1..=max_attempts {
        let started = Instant::now();
        let response = ctx.gateway.generate(ctx.model, state.parts()).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Some(ref usage) = response.usage {
            ctx.usage.record(ctx.model, usage, ctx.config.usd_to_inr);
            if usage.thoughts_token_count > 0 {
                ctx.sink.on_thoughts(ctx.model, usage.thoughts_token_count);
            }
        }
        ctx.sink.on_token_update(ctx.usage);
        ctx.sink.on_model_call(&ModelCallEvent {
            model: ctx.model.to_string(),
            stage: stage.to_string(),
            attempt,
            repair: state.is_repair(),
            duration_ms,
            produced_text: response.text.is_some(),
        });

        let Some(text) = response.text else {
            debug!(stage, attempt, "model produced no text");
            continue;
        };

        let Some(candidate) = extract_json(&text) else {
            debug!(stage, attempt, "no JSON span in model output");
            continue;
        };

        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(_) => return Ok(Some(candidate)),
            Err(err) => {
                debug!(stage, attempt, %err, "JSON parse failed; switching to repair prompt");
                state = Attempt::Repair(vec![
                    PromptPart::text(REPAIR_INSTRUCTION),
                    PromptPart::Text(candidate),
                ]);
            }
        }
    }

    warn!(stage, max_attempts, "JSON generation attempts exhausted");
    Ok(None)
}
