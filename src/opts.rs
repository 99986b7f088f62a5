/// Default spoken language passed to the speech-to-text backend.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default decoder prompt.
///
/// Speech-to-text models tend to "clean up" disfluencies; priming the decoder with a few filler
/// words makes it far more likely to keep them in the transcript.
pub const DEFAULT_INITIAL_PROMPT: &str = "Include filler words like um, uh, ah, er, hmm.";

/// Container recorded by browser `MediaRecorder` clients.
pub const DEFAULT_STREAM_CONTAINER: &str = "webm";

/// Minimum vertical eyelid gap (normalized face-mesh units) for an eye to count as open.
pub const DEFAULT_EYE_OPENNESS_THRESHOLD: f32 = 0.02;

/// Options that control how an answer is analyzed.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// Binaries map their flags into this type so other frontends (tests, batch jobs) can construct
/// options programmatically.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Spoken language hint (e.g. `"en"`). `None` lets the backend auto-detect.
    pub language: Option<String>,

    /// Decoder prompt used to bias recognition toward filler-word vocabulary.
    pub initial_prompt: Option<String>,

    /// Container hint used when probing streamed chunks (browsers record `"webm"`).
    pub stream_container_hint: Option<String>,

    /// Worker threads handed to the speech-to-text backend per call.
    pub threads: usize,

    /// Eyelid gap both eyes must exceed for a frame to count as eye contact.
    pub eye_openness_threshold: f32,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            language: Some(DEFAULT_LANGUAGE.to_owned()),
            initial_prompt: Some(DEFAULT_INITIAL_PROMPT.to_owned()),
            stream_container_hint: Some(DEFAULT_STREAM_CONTAINER.to_owned()),
            threads: num_cpus::get(),
            eye_openness_threshold: DEFAULT_EYE_OPENNESS_THRESHOLD,
        }
    }
}
