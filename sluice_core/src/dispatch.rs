use crate::engine::FuzzerMain;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const IDENTITY_LINE: &str = "sluice fuzzer instance";
const DEFAULT_PROGRAM_NAME: &str = "sluice";
const DICTIONARY_FLAG: &str = "-x";

/// A validated process argument vector.
///
/// Accepted shapes are `prog corpus_dir seed_dir` and
/// `prog -x dict corpus_dir seed_dir`; both directories must exist. The
/// dictionary is passed through to the engine without being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub dictionary: Option<PathBuf>,
    pub corpus_dir: PathBuf,
    pub seed_dir: PathBuf,
}

impl Invocation {
    pub fn from_args<S: AsRef<OsStr>>(args: &[S]) -> Option<Self> {
        let (program, dictionary, corpus_dir, seed_dir) = match args {
            [program, corpus, seeds] => (program, None, corpus, seeds),
            [program, flag, dict, corpus, seeds] if flag.as_ref() == DICTIONARY_FLAG => {
                (program, Some(dict), corpus, seeds)
            }
            _ => {
                debug!(argc = args.len(), "unrecognized argument shape");
                return None;
            }
        };

        let corpus_dir = PathBuf::from(corpus_dir);
        let seed_dir = PathBuf::from(seed_dir);
        if !is_directory(&corpus_dir) || !is_directory(&seed_dir) {
            debug!(?corpus_dir, ?seed_dir, "corpus or seed path is not a directory");
            return None;
        }

        Some(Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            dictionary: dictionary.map(PathBuf::from),
            corpus_dir,
            seed_dir,
        })
    }
}

/// One status query; anything that cannot be queried counts as "not a directory".
fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Outcome of dispatching a process's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Arguments validated and the engine's run loop was entered.
    Started,
    /// Arguments were rejected and the usage text was printed.
    Usage,
}

/// Decides whether this process becomes a fuzzing worker.
///
/// `dispatch` consumes the dispatcher, so the engine is entered at most once.
pub struct Dispatcher<E: FuzzerMain, W: Write> {
    engine: E,
    out: W,
}

impl<E: FuzzerMain, W: Write> Dispatcher<E, W> {
    pub fn new(engine: E, out: W) -> Self {
        Self { engine, out }
    }

    pub fn dispatch<S: AsRef<OsStr>>(mut self, args: &[S]) -> Result<Dispatch, anyhow::Error> {
        match Invocation::from_args(args) {
            Some(invocation) => {
                info!(
                    corpus_dir = ?invocation.corpus_dir,
                    seed_dir = ?invocation.seed_dir,
                    dictionary = ?invocation.dictionary,
                    "arguments valid, entering engine run loop"
                );
                self.engine.fuzzer_main(&invocation)?;
                Ok(Dispatch::Started)
            }
            None => {
                let program = args
                    .first()
                    .map(|p| p.as_ref().to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string());
                write_usage(&mut self.out, &program)?;
                Ok(Dispatch::Usage)
            }
        }
    }
}

pub fn write_usage<W: Write>(out: &mut W, program: &str) -> std::io::Result<()> {
    writeln!(out, "{IDENTITY_LINE}")?;
    writeln!(out, "Syntax: {program} [-x dictionary] corpus_dir seed_dir")?;
    out.flush()
}

/// The process entry seam.
///
/// The `sluice` binary runs `DefaultBootstrap`. Programs that need a different
/// entry point build without the `default-main` feature and provide their own
/// implementation.
pub trait Bootstrap {
    /// Runs the process and returns its exit status.
    fn run(self, args: Vec<OsString>) -> Result<u8, anyhow::Error>;
}

/// Validates arguments, then either enters the engine or prints usage.
///
/// The exit status is always 0: rejected arguments, an engine that fails to
/// start and an unwritable usage stream are logged, never surfaced as a
/// process failure.
pub struct DefaultBootstrap<E: FuzzerMain, W: Write> {
    dispatcher: Dispatcher<E, W>,
}

impl<E: FuzzerMain, W: Write> DefaultBootstrap<E, W> {
    pub fn new(engine: E, out: W) -> Self {
        Self {
            dispatcher: Dispatcher::new(engine, out),
        }
    }
}

impl<E: FuzzerMain, W: Write> Bootstrap for DefaultBootstrap<E, W> {
    fn run(self, args: Vec<OsString>) -> Result<u8, anyhow::Error> {
        match self.dispatcher.dispatch(args.as_slice()) {
            Ok(outcome) => debug!(?outcome, "dispatch finished"),
            Err(e) => error!("dispatch failed: {e:#}"),
        }
        Ok(0)
    }
}
