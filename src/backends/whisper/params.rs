use anyhow::{Context, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperState};

use crate::opts::Opts;

/// Decoding parameters for one independent pass.
///
/// - greedy decoding at temperature 0 with no fallback, so the same audio always yields the same
///   text
/// - no conditioning on previous text
/// - token timestamps on, so words can be timed
fn build_full_params(opts: &Opts) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

    params.set_n_threads(opts.threads.max(1) as i32);
    params.set_translate(false);
    params.set_language(opts.language.as_deref());
    params.set_no_context(true);
    params.set_single_segment(false);
    params.set_temperature(0.0);
    params.set_temperature_inc(0.0);

    if let Some(prompt) = opts.initial_prompt.as_deref() {
        params.set_initial_prompt(prompt);
    }

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params.set_token_timestamps(true);

    params
}

pub(super) fn run_whisper_full(
    ctx: &WhisperContext,
    opts: &Opts,
    samples: &[f32],
) -> Result<WhisperState> {
    let params = build_full_params(opts);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}
