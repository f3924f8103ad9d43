//! Framer fuzzer: `packet_boundary` must be total over arbitrary bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shine_proto::{packet_boundary, Boundary};

fuzz_target!(|input: (Vec<u8>, usize)| {
    let (buffer, offset) = input;

    match packet_boundary(&buffer, offset) {
        Boundary::Frame { length, class } => {
            // A complete header was read, entirely inside the buffer
            assert!(offset + class.header_len() <= buffer.len());
            // Length fits the header's numeric range
            assert!(length <= u16::MAX as usize);
        }
        Boundary::NeedHeader => {
            // Only ever reported when a full header is genuinely missing
            assert!(buffer.len().saturating_sub(offset) < 3);
        }
    }
});
