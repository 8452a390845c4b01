use std::process::ExitCode;

use tileclient_engine::run_app;
use tracing::error;

use super::bootstrap::{AppWiring, RunMode};
use super::headless::run_headless;
use super::scenario;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        mode,
        config,
        atlases,
        animations,
        store,
    } = app;

    match mode {
        RunMode::Windowed => {
            let result = run_app(config, atlases.pipeline(), store, |game| {
                *game.animations_mut() = animations;
                scenario::populate(game);
            });
            if let Err(err) = result {
                error!(error = %err, "run_failed");
                return ExitCode::FAILURE;
            }
        }
        RunMode::Headless { frames } => {
            if let Err(err) = run_headless(config, &atlases, animations, frames) {
                error!(error = %err, "headless_run_failed");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
