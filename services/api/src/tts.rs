//! Text-to-Speech
//!
//! Google Cloud TTS over its REST endpoint. Rendered MP3s are cached on disk under
//! a name derived from the voice and text, so repeated lines are synthesised once.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::Engine;
use colloquy_core::speech::SpeechRenderer;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// URL prefix the audio directory is served under.
pub const AUDIO_ROUTE: &str = "/static/audio";

const GOOGLE_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

pub fn audio_url(file_name: &str) -> String {
    format!("{AUDIO_ROUTE}/{file_name}")
}

/// Voice name and SSML gender for a speaker slot. Unknown slots use `speaker1`.
pub fn voice_profile(slot: &str) -> (&'static str, &'static str) {
    match slot {
        "speaker2" => ("en-US-Wavenet-J", "MALE"),
        _ => ("en-US-Wavenet-G", "FEMALE"),
    }
}

/// Content-addressed store of rendered audio files.
#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(text: &str, voice: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(voice.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        format!("{:x}.mp3", hasher.finalize())
    }

    /// File name of a cached, non-empty rendering.
    pub async fn lookup(&self, text: &str, voice: &str) -> Option<String> {
        let name = Self::file_name(text, voice);
        match tokio::fs::metadata(self.dir.join(&name)).await {
            Ok(meta) if meta.len() > 0 => Some(name),
            _ => None,
        }
    }

    /// Writes `audio` through a temporary file and renames it into place.
    pub async fn store(&self, text: &str, voice: &str, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            bail!("refusing to cache empty audio");
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let name = Self::file_name(text, voice);
        let tmp = self.dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, audio)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, self.dir.join(&name)).await?;
        Ok(name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

pub struct GoogleTtsRenderer {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    cache: AudioCache,
}

impl GoogleTtsRenderer {
    pub fn new(api_key: impl Into<String>, cache: AudioCache) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: GOOGLE_TTS_ENDPOINT.to_string(),
            cache,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns the audio URL for `text`, synthesising it when it is not cached.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            bail!("nothing to synthesise");
        }
        if let Some(name) = self.cache.lookup(text, voice).await {
            debug!(file = %name, "Audio cache hit");
            return Ok(audio_url(&name));
        }

        let (name, gender) = voice_profile(voice);
        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": "en-US", "name": name, "ssmlGender": gender },
            "audioConfig": { "audioEncoding": "MP3" }
        });
        let response: SynthesizeResponse = self
            .http
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .context("TTS request failed")?
            .error_for_status()?
            .json()
            .await
            .context("TTS response was not valid JSON")?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(response.audio_content)
            .context("TTS audio was not valid base64")?;

        let file = self.cache.store(text, voice, &audio).await?;
        info!(file = %file, bytes = audio.len(), voice, "Generated audio");
        Ok(audio_url(&file))
    }
}

#[async_trait]
impl SpeechRenderer for GoogleTtsRenderer {
    async fn render(&self, text: &str, voice: &str) -> Option<String> {
        match self.synthesize(text, voice).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Text-to-speech failed; continuing without audio");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn test_file_name_depends_on_voice_and_text() {
        let a = AudioCache::file_name("hello", "speaker1");
        let b = AudioCache::file_name("hello", "speaker2");
        assert_ne!(a, b);
        assert_eq!(a, AudioCache::file_name("hello", "speaker1"));
        assert!(a.ends_with(".mp3"));
        assert_eq!(a.len(), 64 + 4);
    }

    #[test]
    fn test_voice_profiles() {
        assert_eq!(voice_profile("speaker1").0, "en-US-Wavenet-G");
        assert_eq!(voice_profile("speaker2").1, "MALE");
        assert_eq!(voice_profile("narrator"), voice_profile("speaker1"));
    }

    #[tokio::test]
    async fn test_cache_store_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path().join("audio"));

        assert_eq!(cache.lookup("hi", "speaker1").await, None);
        let name = cache.store("hi", "speaker1", b"ID3fake").await.unwrap();
        assert_eq!(cache.lookup("hi", "speaker1").await, Some(name.clone()));
        assert_eq!(
            std::fs::read(cache.dir().join(&name)).unwrap(),
            b"ID3fake".to_vec()
        );
        let leftovers = std::fs::read_dir(cache.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert!(cache.store("hi", "speaker1", b"").await.is_err());
    }

    async fn fake_google(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/synthesize",
            post(move |Json(body): Json<serde_json::Value>| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
                    let audio = base64::engine::general_purpose::STANDARD.encode(b"mp3-bytes");
                    Json(json!({ "audioContent": audio }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/synthesize")
    }

    #[tokio::test]
    async fn test_synthesize_caches_audio() {
        let hits = Arc::new(AtomicUsize::new(0));
        let endpoint = fake_google(hits.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let renderer =
            GoogleTtsRenderer::new("key", AudioCache::new(dir.path())).with_endpoint(endpoint);

        let first = renderer.render("Good morning", "speaker2").await.unwrap();
        let second = renderer.render("Good morning", "speaker2").await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("/static/audio/"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_failure_yields_no_audio() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = GoogleTtsRenderer::new("key", AudioCache::new(dir.path()))
            .with_endpoint("http://127.0.0.1:9/unreachable");
        assert_eq!(renderer.render("Hello", "speaker1").await, None);
        assert_eq!(renderer.render("   ", "speaker1").await, None);
    }
}
