//! External profiling engine.
//!
//! The engine is a black box: tokens in, interpretations keyed by OCR type
//! out. [`ProcessEngine`] runs the profiler executable; tests substitute
//! their own [`ProfileEngine`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::language::LanguageConfig;
use crate::types::{BookId, Interpretation, Profile, Token};

/// Cancellation signal for one job. Cancelled once the value turns `true`.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a fresh, uncancelled signal together with its trigger.
pub fn cancel_pair() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Resolves once `cancel` fires. Never resolves if the trigger is dropped
/// without firing.
pub async fn cancelled(cancel: &mut CancelSignal) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[async_trait]
pub trait ProfileEngine: Send + Sync {
    /// Profile `tokens` with the given language resources. Must return
    /// [`EngineError::Cancelled`] promptly once `cancel` fires.
    async fn profile(
        &self,
        config: &LanguageConfig,
        tokens: &[Token],
        cancel: CancelSignal,
    ) -> Result<BTreeMap<String, Interpretation>, EngineError>;
}

/// Invoke the engine once for a whole book. No retries.
pub async fn run_profile(
    engine: &dyn ProfileEngine,
    cancel: CancelSignal,
    config: &LanguageConfig,
    book_id: BookId,
    tokens: &[Token],
) -> Result<Profile, EngineError> {
    if *cancel.borrow() {
        return Err(EngineError::Cancelled);
    }
    debug!(
        book_id,
        language = %config.language,
        tokens = tokens.len(),
        "profiling tokens"
    );
    let profile = engine.profile(config, tokens, cancel).await?;
    info!(book_id, types = profile.len(), "profiler finished");
    Ok(Profile { book_id, profile })
}

// ─── Process adapter ──────────────────────────────────────────

/// Runs the profiler executable, one process per job.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    exe: PathBuf,
}

impl ProcessEngine {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }
}

/// One token per line: `OCR`, or `OCR:COR` when the correction is trusted.
///
/// The OCR side must be free of `:` and line breaks for the line to parse;
/// tokens that are not are skipped. A correction holding a line break is
/// withheld and the OCR form sent alone.
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let mut buf = Vec::new();
    for token in tokens {
        let (ocr, cor) = token.engine_input();
        if ocr.is_empty() {
            continue;
        }
        if ocr.contains([':', '\n', '\r']) {
            debug!(ocr, "skipping unencodable token");
            continue;
        }
        buf.extend_from_slice(ocr.as_bytes());
        match cor {
            Some(cor) if cor.contains(['\n', '\r']) => {
                debug!(ocr, "withholding correction with a line break");
            }
            Some(cor) => {
                buf.push(b':');
                buf.extend_from_slice(cor.as_bytes());
            }
            None => {}
        }
        buf.push(b'\n');
    }
    buf
}

#[async_trait]
impl ProfileEngine for ProcessEngine {
    async fn profile(
        &self,
        config: &LanguageConfig,
        tokens: &[Token],
        mut cancel: CancelSignal,
    ) -> Result<BTreeMap<String, Interpretation>, EngineError> {
        let mut child = Command::new(&self.exe)
            .arg("--config")
            .arg(&config.path)
            .args([
                "--sourceFormat",
                "EXT",
                "--sourceFile",
                "/dev/stdin",
                "--jsonOutput",
                "/dev/stdout",
                "--types",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                exe: self.exe.clone(),
                source,
            })?;
        debug!(exe = %self.exe.display(), pid = ?child.id(), "profiler started");

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("profiler stdin not captured"))?;
        let input = encode_tokens(tokens);
        let run = async move {
            let feed = async move {
                stdin.write_all(&input).await?;
                stdin.shutdown().await
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                debug!(target: "ocr_profiler::engine::stderr", "{line}");
            }
            if !output.status.success() {
                return Err(EngineError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            fed?;
            let profile: BTreeMap<String, Interpretation> = serde_json::from_slice(&output.stdout)?;
            Ok::<_, EngineError>(profile)
        };

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                // dropping `run` kills the child
                warn!(exe = %self.exe.display(), "profiler cancelled");
                Err(EngineError::Cancelled)
            }
            res = run => res,
        }
    }
}
