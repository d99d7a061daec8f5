use crate::config::EngineSettings;
use crate::dispatch::Invocation;
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::info;

/// The fuzzing engine's run loop, entered at most once per process.
///
/// Scheduling, mutation, corpus handling and timeouts all belong to the
/// engine; this crate only decides whether to call it.
pub trait FuzzerMain {
    fn fuzzer_main(&mut self, invocation: &Invocation) -> Result<(), anyhow::Error>;
}

impl<F> FuzzerMain for F
where
    F: FnMut(&Invocation) -> Result<(), anyhow::Error>,
{
    fn fuzzer_main(&mut self, invocation: &Invocation) -> Result<(), anyhow::Error> {
        self(invocation)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No engine command configured (set [engine] command in the config file)")]
    NotConfigured,
    #[error("Failed to spawn engine command '{command:?}': {source}")]
    Spawn {
        command: Vec<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine exited unsuccessfully: {0}")]
    Exited(ExitStatus),
}

/// Runs an external engine binary with the validated directories.
///
/// stdio is inherited so the engine's own status output and crash reports
/// reach the terminal untouched. No signal handlers or timeouts are
/// installed; the engine owns both.
pub struct CommandEngine {
    settings: EngineSettings,
}

impl CommandEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Expands the argument templates for one invocation.
    ///
    /// Templates mentioning `{dictionary}` are dropped when no dictionary was
    /// given.
    pub fn render_command(&self, invocation: &Invocation) -> Vec<String> {
        let corpus = invocation.corpus_dir.to_string_lossy();
        let seeds = invocation.seed_dir.to_string_lossy();
        let dictionary = invocation
            .dictionary
            .as_ref()
            .map(|d| d.to_string_lossy().into_owned());

        self.settings
            .command
            .iter()
            .filter_map(|template| {
                let arg = template
                    .replace("{corpus_dir}", &corpus)
                    .replace("{seed_dir}", &seeds);
                if arg.contains("{dictionary}") {
                    dictionary.as_ref().map(|d| arg.replace("{dictionary}", d))
                } else {
                    Some(arg)
                }
            })
            .collect()
    }
}

impl FuzzerMain for CommandEngine {
    fn fuzzer_main(&mut self, invocation: &Invocation) -> Result<(), anyhow::Error> {
        let command = self.render_command(invocation);
        let Some((program, args)) = command.split_first() else {
            return Err(EngineError::NotConfigured.into());
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &self.settings.working_dir {
            cmd.current_dir(cwd);
        }

        info!(?command, "starting fuzzing engine");
        let status = cmd.status().map_err(|source| EngineError::Spawn {
            command: command.clone(),
            source,
        })?;

        if status.success() {
            info!("fuzzing engine finished");
            Ok(())
        } else {
            Err(EngineError::Exited(status).into())
        }
    }
}
