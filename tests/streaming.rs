mod common;

use poise::message::ClientMessage;
use poise::session::ChunkOutcome;
use poise::{Error, Poise, ScoreSnapshot, Session};

use common::{ANSWER_25_WORDS_2_FILLERS, ScriptedTranscriber, wav_bytes, wav_opts};

fn b64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[test]
fn ten_second_chunk_scores_66() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::always(ANSWER_25_WORDS_2_FILLERS),
        wav_opts(),
    );
    let mut session = Session::new();

    let chunk = poise.transcribe_chunk(wav_bytes(16_000, 1, 10.0, 0))?;
    assert_eq!(chunk.tokens.len(), 25);
    assert_eq!(chunk.duration_seconds, 10.0);

    let outcome = session.ingest(Ok(chunk))?;
    let ChunkOutcome::Scored(snapshot) = outcome else {
        panic!("expected a scored chunk");
    };
    assert_eq!(snapshot.fillers, 2);
    assert_eq!(snapshot.wpm, 150);
    assert_eq!(snapshot.confidence, 66);
    assert!(snapshot.transcript.starts_with("um i have spent"));

    assert_eq!(poise.transcriber().seen_samples(), vec![160_000]);
    Ok(())
}

#[test]
fn message_to_snapshot_round_trip() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(ScriptedTranscriber::always("hello there"), wav_opts());
    let mut session = Session::new();

    let text = format!(r#"{{"audio": "{}"}}"#, b64(&wav_bytes(16_000, 1, 1.0, 0)));
    let ClientMessage::AudioChunk(chunk) = ClientMessage::parse(&text) else {
        panic!("expected an audio chunk");
    };

    let processed = chunk.decode().and_then(|bytes| poise.transcribe_chunk(bytes));
    let snapshot = session.ingest(processed)?.into_snapshot();

    let wire = serde_json::to_value(&snapshot)?;
    assert_eq!(
        wire,
        serde_json::json!({
            "transcript": "hello there",
            "fillers": 0,
            "wpm": 120,
            "confidence": 50 + 20 - 10,
        })
    );
    Ok(())
}

#[test]
fn undecodable_chunk_degrades_without_losing_state() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(ScriptedTranscriber::always("um hello"), wav_opts());
    let mut session = Session::new();

    let first = poise.transcribe_chunk(wav_bytes(16_000, 1, 1.0, 0));
    session.ingest(first)?;

    let broken = poise.transcribe_chunk(b"not audio at all".to_vec());
    assert!(matches!(broken, Err(Error::Decode(_))));

    let outcome = session.ingest(broken)?;
    assert!(matches!(outcome, ChunkOutcome::Degraded { .. }));
    assert_eq!(
        outcome.into_snapshot(),
        ScoreSnapshot {
            transcript: "um hello".into(),
            fillers: 1,
            wpm: 0,
            confidence: 50,
        }
    );

    // The session keeps going: the next good chunk is scored against the preserved totals.
    let next = session.ingest(poise.transcribe_chunk(wav_bytes(16_000, 1, 1.0, 0)))?;
    let snapshot = next.into_snapshot();
    assert_eq!(snapshot.transcript, "um hello um hello");
    assert_eq!(snapshot.fillers, 2);
    assert_eq!(snapshot.wpm, 120);
    Ok(())
}

#[test]
fn transcription_failure_degrades() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(
        ScriptedTranscriber::new([Ok("fine"), Err("model crashed"), Ok("again")]),
        wav_opts(),
    );
    let mut session = Session::new();

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        let processed = poise.transcribe_chunk(wav_bytes(16_000, 1, 1.0, 0));
        let outcome = session.ingest(processed)?;
        outcomes.push((
            matches!(outcome, ChunkOutcome::Degraded { .. }),
            outcome.snapshot().wpm,
        ));
    }

    assert_eq!(outcomes, vec![(false, 60), (true, 0), (false, 60)]);

    let summary = session.close();
    assert_eq!(summary.chunks_scored, 2);
    assert_eq!(summary.chunks_degraded, 1);
    assert_eq!(summary.last_snapshot.transcript, "fine again");
    Ok(())
}

#[test]
fn malformed_messages_touch_nothing() {
    let session = Session::new();
    for text in [r#"{"type": "ping"}"#, "garbage", r#"{"Audio": "aGk="}"#] {
        assert_eq!(ClientMessage::parse(text), ClientMessage::Unknown);
    }
    assert!(session.transcript_words().is_empty());
    assert_eq!(session.filler_count(), 0);
}

#[test]
fn sessions_are_independent() -> anyhow::Result<()> {
    let poise = Poise::with_transcriber(ScriptedTranscriber::always("so basically yes"), wav_opts());
    let mut a = Session::new();
    let b = Session::new();

    a.ingest(poise.transcribe_chunk(wav_bytes(16_000, 1, 1.0, 0)))?;

    assert_ne!(a.id(), b.id());
    assert_eq!(a.filler_count(), 2);
    assert_eq!(b.filler_count(), 0);
    Ok(())
}
