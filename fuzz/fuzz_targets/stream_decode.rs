//! Frame cursor fuzzer: arbitrary streams, arbitrary segmentation.
//!
//! Whatever bytes arrive and however they are sliced, the cursor must not
//! panic, must keep its offset inside the buffer, and must produce exactly
//! the frames a single-shot feed of the same stream produces.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shine_flow::FrameCursor;

fuzz_target!(|input: (Vec<u8>, Vec<u8>)| {
    let (stream, cuts) = input;

    // Reference: feed the whole stream at once
    let mut reference = FrameCursor::new();
    reference.extend(&stream);
    let mut expected = Vec::new();
    while let Some(frame) = reference.take_frame() {
        assert_eq!(frame.block.len(), frame.length);
        expected.push(frame.block);
    }

    // Slice the stream at fuzzer-chosen points and replay
    let mut cursor = FrameCursor::new();
    let mut produced = Vec::new();
    let mut consumed = 0;
    for cut in cuts {
        let take = (cut as usize).min(stream.len() - consumed);
        cursor.extend(&stream[consumed..consumed + take]);
        consumed += take;
        while let Some(frame) = cursor.take_frame() {
            produced.push(frame.block);
        }
    }
    cursor.extend(&stream[consumed..]);
    while let Some(frame) = cursor.take_frame() {
        produced.push(frame.block);
    }

    assert!(cursor.offset() <= cursor.buffered());
    assert_eq!(produced, expected);
});
