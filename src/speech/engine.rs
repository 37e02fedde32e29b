//! On-device speech engine backend

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::{BackendError, BackendKind, Delivery, SpeechBackend};

/// Voice reported by a local engine
///
/// Engines differ in which metadata they expose, so both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineVoice {
    /// Engine-specific identifier passed back to `speak`
    pub id: String,
    pub name: Option<String>,
    pub gender: Option<String>,
}

impl EngineVoice {
    fn matches_female(&self) -> bool {
        [self.name.as_deref(), self.gender.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains("female"))
    }
}

/// Pick the first voice whose name or gender mentions "female"
///
/// Returns `None` when no voice matches, meaning the engine default.
#[must_use]
pub fn select_voice(voices: &[EngineVoice]) -> Option<&EngineVoice> {
    voices.iter().find(|v| v.matches_female())
}

/// Blocking local synthesis engine
///
/// Called from a blocking thread; implementations may block on the audio
/// device until speech finishes.
pub trait SpeechEngine: Send + Sync {
    /// Voices in the order the engine reports them
    ///
    /// # Errors
    ///
    /// Returns a description of why voices could not be enumerated
    fn voices(&self) -> Result<Vec<EngineVoice>, String>;

    /// Speak `text` aloud, with the engine default when `voice` is `None`
    ///
    /// # Errors
    ///
    /// Returns a description of why speech failed
    fn speak(&self, text: &str, voice: Option<&EngineVoice>) -> Result<(), String>;
}

/// Runs a [`SpeechEngine`] behind a failure boundary
///
/// Initialization, voice enumeration and playback all run on a blocking
/// thread; any error or panic there becomes `BackendError::Engine`.
pub struct LocalEngineBackend {
    engine: Arc<dyn SpeechEngine>,
}

impl LocalEngineBackend {
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SpeechBackend for LocalEngineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalEngine
    }

    async fn speak(&self, text: &str) -> Result<Delivery, BackendError> {
        let engine = Arc::clone(&self.engine);
        let text = text.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let voices = engine.voices()?;
            let voice = select_voice(&voices);
            match voice {
                Some(v) => tracing::debug!(voice = %v.id, "using female voice"),
                None => tracing::debug!(available = voices.len(), "using engine default voice"),
            }
            engine.speak(&text, voice)
        });

        match task.await {
            Ok(Ok(())) => Ok(Delivery::Played),
            Ok(Err(e)) => Err(BackendError::Engine(e)),
            Err(e) if e.is_panic() => Err(BackendError::Engine("speech engine panicked".to_string())),
            Err(e) => Err(BackendError::Engine(e.to_string())),
        }
    }
}

/// `espeak-ng` driven as a subprocess
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    binary: String,
}

impl EspeakEngine {
    #[must_use]
    pub const fn new(binary: String) -> Self {
        Self { binary }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output, String> {
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to run {}: {e}", self.binary))
    }

    /// Run with `input` on stdin so text is never parsed as options
    fn run_with_input(&self, args: &[&str], input: &str) -> Result<std::process::Output, String> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to run {}: {e}", self.binary))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| format!("failed to write to {}: {e}", self.binary))?;
        }

        child
            .wait_with_output()
            .map_err(|e| format!("failed to wait for {}: {e}", self.binary))
    }
}

impl SpeechEngine for EspeakEngine {
    fn voices(&self) -> Result<Vec<EngineVoice>, String> {
        let output = self.run(&["--voices"])?;
        if !output.status.success() {
            return Err(format!("{} --voices exited with {}", self.binary, output.status));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn speak(&self, text: &str, voice: Option<&EngineVoice>) -> Result<(), String> {
        let mut args = Vec::with_capacity(3);
        if let Some(v) = voice {
            args.extend(["-v", v.id.as_str()]);
        }
        args.push("--stdin");

        let output = self.run_with_input(&args, text)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()));
        }
        Ok(())
    }
}

/// Parse `espeak-ng --voices` output
///
/// Columns are `Pty Language Age/Gender VoiceName File [Other Languages]`.
/// Gender letters are expanded so `F` reads as "female".
fn parse_voice_list(output: &str) -> Vec<EngineVoice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let [_, language, age_gender, name, ..] = cols.as_slice() else {
                return None;
            };

            let gender = age_gender
                .rsplit('/')
                .next()
                .and_then(|g| match g {
                    "F" => Some("female"),
                    "M" => Some("male"),
                    _ => None,
                })
                .map(ToString::to_string);

            Some(EngineVoice {
                id: (*language).to_string(),
                name: Some((*name).replace('_', " ")),
                gender,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: Option<&str>, gender: Option<&str>) -> EngineVoice {
        EngineVoice {
            id: id.to_string(),
            name: name.map(ToString::to_string),
            gender: gender.map(ToString::to_string),
        }
    }

    #[test]
    fn test_select_female_by_gender() {
        let voices = vec![
            voice("alice", Some("Alice"), Some("female")),
            voice("bob", Some("Bob"), Some("male")),
        ];
        assert_eq!(select_voice(&voices).unwrap().name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_select_female_by_name_case_insensitive() {
        let voices = vec![
            voice("a", None, None),
            voice("b", Some("English FEMALE 2"), None),
            voice("c", Some("Zira"), Some("Female")),
        ];
        assert_eq!(select_voice(&voices).unwrap().id, "b");
    }

    #[test]
    fn test_select_none_when_no_match() {
        let voices = vec![voice("bob", Some("Bob"), Some("male")), voice("x", None, None)];
        assert!(select_voice(&voices).is_none());
        assert!(select_voice(&[]).is_none());
    }

    #[test]
    fn test_parse_espeak_voices() {
        let output = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 5  en-us           --/F      English_(America)  gmw/en-US            (en 10)
 garbage
";
        let voices = parse_voice_list(output);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].gender.as_deref(), Some("male"));
        assert_eq!(voices[1].name.as_deref(), Some("English (Great Britain)"));
        assert_eq!(select_voice(&voices).unwrap().id, "en-us");
    }

    #[test]
    fn test_missing_binary_is_error() {
        let engine = EspeakEngine::new("definitely-not-espeak-binary".to_string());
        assert!(engine.voices().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_text_is_sent_on_stdin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let text_file = dir.path().join("text");
        let binary = dir.path().join("fake-espeak");
        std::fs::write(
            &binary,
            format!(
                "#!/bin/sh\necho \"$@\" > {}\ncat > {}\n",
                args_file.display(),
                text_file.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = EspeakEngine::new(binary.display().to_string());
        let female = voice("en-us", None, Some("female"));
        engine.speak("-500 rupees", Some(&female)).unwrap();

        assert_eq!(std::fs::read_to_string(&args_file).unwrap().trim(), "-v en-us --stdin");
        assert_eq!(std::fs::read_to_string(&text_file).unwrap(), "-500 rupees");
    }
}
