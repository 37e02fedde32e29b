//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use currency_announcer::audio::AudioSink;
use currency_announcer::detection::{Detection, DetectionResult, ImageFormat, InferenceClient};
use currency_announcer::speech::{
    BackendError, BackendKind, Delivery, EngineVoice, SpeechBackend, SpeechEngine,
};
use currency_announcer::{Error, Result};

/// Backend that returns a fixed result and counts calls
pub struct ScriptedBackend {
    kind: BackendKind,
    result: std::result::Result<Delivery, BackendError>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(
        kind: BackendKind,
        result: std::result::Result<Delivery, BackendError>,
    ) -> (Box<dyn SpeechBackend>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Self {
            kind,
            result,
            calls: Arc::clone(&calls),
        };
        (Box::new(backend), calls)
    }

    pub fn played(kind: BackendKind) -> (Box<dyn SpeechBackend>, Arc<AtomicUsize>) {
        Self::new(kind, Ok(Delivery::Played))
    }

    pub fn failing(
        kind: BackendKind,
        error: BackendError,
    ) -> (Box<dyn SpeechBackend>, Arc<AtomicUsize>) {
        Self::new(kind, Err(error))
    }
}

#[async_trait]
impl SpeechBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn speak(&self, _text: &str) -> std::result::Result<Delivery, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Sink that records what it was asked to play
#[derive(Default)]
pub struct RecordingSink {
    pub played: Mutex<Vec<Vec<u8>>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingSink {
    fn play_mp3(&self, data: &[u8]) -> Result<()> {
        if self.fail {
            return Err(Error::Audio("no output device available".to_string()));
        }
        self.played.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

/// How a [`MockEngine`] behaves
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Working,
    VoicesFail,
    SpeakFails,
    Panics,
}

/// In-memory speech engine
pub struct MockEngine {
    voices: Vec<EngineVoice>,
    mode: EngineMode,
    /// (text, selected voice id) per `speak` call
    pub spoken: Mutex<Vec<(String, Option<String>)>>,
}

impl MockEngine {
    pub fn new(voices: Vec<EngineVoice>, mode: EngineMode) -> Arc<Self> {
        Arc::new(Self {
            voices,
            mode,
            spoken: Mutex::new(Vec::new()),
        })
    }

    pub fn working() -> Arc<Self> {
        Self::new(Vec::new(), EngineMode::Working)
    }

    pub fn spoken(&self) -> Vec<(String, Option<String>)> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for MockEngine {
    fn voices(&self) -> std::result::Result<Vec<EngineVoice>, String> {
        match self.mode {
            EngineMode::VoicesFail => Err("voice enumeration failed".to_string()),
            _ => Ok(self.voices.clone()),
        }
    }

    fn speak(&self, text: &str, voice: Option<&EngineVoice>) -> std::result::Result<(), String> {
        match self.mode {
            EngineMode::SpeakFails => Err("audio device busy".to_string()),
            EngineMode::Panics => panic!("engine driver crashed"),
            _ => {
                self.spoken
                    .lock()
                    .unwrap()
                    .push((text.to_string(), voice.map(|v| v.id.clone())));
                Ok(())
            }
        }
    }
}

pub fn voice(id: &str, name: Option<&str>, gender: Option<&str>) -> EngineVoice {
    EngineVoice {
        id: id.to_string(),
        name: name.map(ToString::to_string),
        gender: gender.map(ToString::to_string),
    }
}

/// Inference client returning canned predictions
pub struct MockInference {
    predictions: Option<Vec<Detection>>,
    annotated: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl MockInference {
    pub fn returning(labels: &[&str]) -> Arc<Self> {
        let predictions = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                #[allow(clippy::cast_precision_loss)]
                let confidence = 0.9 - i as f64 * 0.1;
                Detection::new(*label, confidence)
            })
            .collect();

        Arc::new(Self {
            predictions: Some(predictions),
            annotated: Some(vec![0xFF, 0xD8, 0xFF, 0xE0]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn without_annotation(labels: &[&str]) -> Arc<Self> {
        let mut mock = Arc::try_unwrap(Self::returning(labels)).ok().unwrap();
        mock.annotated = None;
        Arc::new(mock)
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            predictions: None,
            annotated: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn predict(&self, _image: &[u8], _format: ImageFormat) -> Result<DetectionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let predictions = self
            .predictions
            .clone()
            .ok_or_else(|| Error::Inference("503 Service Unavailable: model loading".to_string()))?;

        Ok(DetectionResult {
            predictions,
            image: None,
            annotated: self.annotated.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Minimal JPEG-looking payload
pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']
}
