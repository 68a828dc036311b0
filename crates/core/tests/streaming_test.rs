use anyhow::Result;
use llmserve_core::streaming::{StreamStep, TextStreamer};
use llmserve_core::testing::{token, word_tokenizer};

#[test]
fn emits_text_as_it_becomes_unambiguous() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = Vec::new();
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    assert_eq!(
        streamer.push(token("hello"))?,
        StreamStep::Continue(Some("hello".to_string()))
    );
    assert_eq!(
        streamer.push(token("world"))?,
        StreamStep::Continue(Some(" world".to_string()))
    );
    assert_eq!(streamer.finish(), None);
    assert_eq!(streamer.text(), "hello world");
    Ok(())
}

#[test]
fn holds_back_a_possible_stop_prefix() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = vec!["world peace".to_string()];
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    assert_eq!(
        streamer.push(token("hello"))?,
        StreamStep::Continue(Some("hello".to_string()))
    );
    // " world" could be the start of "world peace"; only the space is safe.
    assert_eq!(
        streamer.push(token("world"))?,
        StreamStep::Continue(Some(" ".to_string()))
    );
    assert_eq!(
        streamer.push(token("end"))?,
        StreamStep::Continue(Some("world end".to_string()))
    );
    assert_eq!(streamer.into_text(), "hello world end");
    Ok(())
}

#[test]
fn stop_string_reports_only_the_preceding_text() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = vec!["the end".to_string()];
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    streamer.push(token("hello"))?;
    let held = streamer.push(token("the"))?;
    assert_eq!(held, StreamStep::Continue(Some(" ".to_string())));

    assert_eq!(streamer.push(token("end"))?, StreamStep::Stopped(None));
    assert_eq!(streamer.text(), "hello ");
    Ok(())
}

#[test]
fn finish_flushes_held_text() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = vec!["here we go".to_string()];
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    streamer.push(token("hello"))?;
    streamer.push(token("here"))?;

    assert_eq!(streamer.finish(), Some("here".to_string()));
    assert_eq!(streamer.finish(), None);
    Ok(())
}

#[test]
fn special_tokens_are_not_rendered() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = Vec::new();
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    streamer.push(token("hello"))?;
    streamer.push(token("<eos>"))?;

    assert_eq!(streamer.text(), "hello");
    Ok(())
}

#[test]
fn long_sequences_decode_a_bounded_window() -> Result<()> {
    let tokenizer = word_tokenizer();
    let stop = Vec::new();
    let mut streamer = TextStreamer::new(&tokenizer, &stop);

    let words = ["once", "upon", "a", "time"];
    for word in words.iter().cycle().take(400) {
        streamer.push(token(word))?;
        assert!(streamer.pending_tokens() <= 2);
    }

    let expected = words.iter().cycle().take(400).copied().collect::<Vec<_>>().join(" ");
    assert_eq!(streamer.text(), expected);
    Ok(())
}
