#![no_main]

use libfuzzer_sys::fuzz_target;

use hookgate::hooks::FieldScanner;

fuzz_target!(|data: &[u8]| {
    // The scanner takes arbitrary bytes from the wire; it must never panic
    // and never emit an empty path.
    let mut scanner = FieldScanner::new();
    scanner.feed(data, |path| {
        assert!(!path.is_empty());
    });

    // Chunked delivery must behave like a single feed.
    let mut chunked = FieldScanner::new();
    for chunk in data.chunks(7) {
        chunked.feed(chunk, |_| {});
    }
});
