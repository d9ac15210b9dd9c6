//! Fuzz target: transform arbitrary source and query spans at arbitrary offsets.
//!
//! Neither entry point executes code, and neither may panic on any input. The first two
//! bytes pick the queried offset.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((offset, rest)) = data.split_first_chunk::<2>() else {
        return;
    };
    let Ok(code) = std::str::from_utf8(rest) else {
        return;
    };
    if code.len() > 8192 {
        return;
    }

    let _ = tsrepl::transform(code);
    let _ = tsrepl::transform_module(code);
    let spans = tsrepl::find_spans(code, usize::from(u16::from_le_bytes(*offset)));
    for span in spans {
        assert!(span.start <= span.end && span.end <= code.len());
    }
});
