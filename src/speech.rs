//! Read-aloud support through whatever speech program the system provides.

use anyhow::{Context, Result, bail};
use tokio::process::{Child, Command};

/// System text-to-speech programs, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechBackend {
    Say,
    EspeakNg,
    Espeak,
    SpdSay,
}

impl SpeechBackend {
    const ALL: [SpeechBackend; 4] = [
        SpeechBackend::Say,
        SpeechBackend::EspeakNg,
        SpeechBackend::Espeak,
        SpeechBackend::SpdSay,
    ];

    pub fn program(self) -> &'static str {
        match self {
            SpeechBackend::Say => "say",
            SpeechBackend::EspeakNg => "espeak-ng",
            SpeechBackend::Espeak => "espeak",
            SpeechBackend::SpdSay => "spd-say",
        }
    }

    /// Command-line arguments for speaking `text` in US English at normal rate
    pub fn args(self, text: &str) -> Vec<String> {
        let mut args: Vec<String> = match self {
            SpeechBackend::Say => vec![],
            SpeechBackend::EspeakNg | SpeechBackend::Espeak => {
                vec!["-v".into(), "en-us".into(), "-s".into(), "175".into()]
            }
            SpeechBackend::SpdSay => vec!["-l".into(), "en-US".into(), "-w".into()],
        };
        // A leading dash would be parsed as an option
        let text = text.trim_start();
        if text.starts_with('-') {
            args.push(format!(" {text}"));
        } else {
            args.push(text.to_string());
        }
        args
    }

    /// First backend found on `PATH`
    pub fn detect() -> Option<SpeechBackend> {
        Self::ALL
            .into_iter()
            .find(|backend| which::which(backend.program()).is_ok())
    }
}

/// Result of toggling playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechToggle {
    Started,
    Stopped,
}

/// Owns at most one running speech process
#[derive(Debug)]
pub struct Speaker {
    backend: Option<SpeechBackend>,
    current: Option<Child>,
}

impl Speaker {
    pub fn new() -> Self {
        let backend = SpeechBackend::detect();
        match backend {
            Some(backend) => tracing::debug!(program = backend.program(), "Speech backend found"),
            None => tracing::debug!("No speech backend on PATH"),
        }
        Self::with_backend(backend)
    }

    pub fn with_backend(backend: Option<SpeechBackend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Whether a previously started utterance is still playing
    pub fn is_speaking(&mut self) -> bool {
        let Some(child) = self.current.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) | Err(_) => {
                self.current = None;
                false
            }
        }
    }

    /// Speak `text`, or stop if something is already playing
    pub fn toggle(&mut self, text: &str) -> Result<SpeechToggle> {
        if self.is_speaking() {
            self.stop();
            return Ok(SpeechToggle::Stopped);
        }

        let Some(backend) = self.backend else {
            bail!("No text-to-speech program found (tried say, espeak-ng, espeak, spd-say)");
        };
        if text.trim().is_empty() {
            bail!("Nothing to read aloud");
        }

        let child = Command::new(backend.program())
            .args(backend.args(text))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", backend.program()))?;

        self.current = Some(child);
        Ok(SpeechToggle::Started)
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Speech process already gone: {e}");
            }
        }
    }
}

impl Default for Speaker {
    fn default() -> Self {
        Self::new()
    }
}
