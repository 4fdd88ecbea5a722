//! Streaming extraction of dotted key paths from JSON payloads.
//!
//! The scan is purely byte-oriented and runs in constant working memory: a
//! nesting depth counter, a small sliding window of recent bytes, and one key
//! name per open level. No full JSON parse happens.
//!
//! Known limitations, kept for output compatibility: arrays are not
//! distinguished from objects (keys inside arrays of objects extend the
//! enclosing path), escape sequences in key names are tolerated but not
//! unescaped, and key names longer than the window are dropped.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Sliding window size; bounds the longest recognizable key name.
const WINDOW_CAP: usize = 64;

/// Sink receiving dotted paths as they are discovered. Entries are transient;
/// persistence is the external indexer's concern.
pub trait IndexSink: Send + Sync {
    fn index(&self, hook_id: &str, field_path: &str);
}

/// Sink that logs discovered paths at debug level.
pub struct LogIndexSink;

impl IndexSink for LogIndexSink {
    fn index(&self, hook_id: &str, field_path: &str) {
        debug!(target: "hooks", hook_id, field_path, "indexed field path");
    }
}

/// Byte-level scanner state.
#[derive(Default)]
pub struct FieldScanner {
    depth: usize,
    keys: Vec<String>,
    window: Vec<u8>,
}

impl FieldScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, invoking `emit` once per discovered path.
    pub fn feed(&mut self, buf: &[u8], mut emit: impl FnMut(&str)) {
        for &b in buf {
            match b {
                b'{' => {
                    self.depth += 1;
                    self.window.clear();
                }
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.keys.truncate(self.depth);
                    self.window.clear();
                }
                b':' => {
                    if let Some(token) = quoted_token(&self.window) {
                        if self.depth > 0 && !token.is_empty() {
                            if self.keys.len() < self.depth {
                                self.keys.resize(self.depth, String::new());
                            }
                            self.keys.truncate(self.depth);
                            self.keys[self.depth - 1] = token;
                            emit(&self.keys.join("."));
                        }
                    }
                    self.window.clear();
                }
                _ => {
                    if self.window.len() == WINDOW_CAP {
                        self.window.clear();
                    }
                    self.window.push(b);
                }
            }
        }
    }
}

/// Extract a `"token"` ending the window (spaces after the closing quote are
/// allowed). Returns `None` when the window does not end in a quoted token.
fn quoted_token(window: &[u8]) -> Option<String> {
    let mut i = window.len();
    while i > 0 && window[i - 1] == b' ' {
        i -= 1;
    }
    if i == 0 || window[i - 1] != b'"' {
        return None;
    }
    let close = i - 1;
    let open = window[..close].iter().rposition(|&b| b == b'"')?;
    Some(String::from_utf8_lossy(&window[open + 1..close]).into_owned())
}

/// Drive a [`FieldScanner`] over a byte stream, reporting each path to the
/// sink. Returns the number of bytes consumed.
pub async fn index_stream<R>(
    mut reader: R,
    hook_id: &str,
    sink: &dyn IndexSink,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + Send,
{
    let mut scanner = FieldScanner::new();
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        scanner.feed(&buf[..n], |path| sink.index(hook_id, path));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Cursor;

    fn scan(input: &[u8]) -> Vec<String> {
        let mut scanner = FieldScanner::new();
        let mut paths = Vec::new();
        scanner.feed(input, |p| paths.push(p.to_string()));
        paths
    }

    #[test]
    fn nested_object_emits_outer_then_inner() {
        assert_eq!(scan(br#"{"a":{"b":1}}"#), vec!["a", "a.b"]);
    }

    #[test]
    fn sibling_after_nested_object_resets_the_path() {
        assert_eq!(
            scan(br#"{"a":{"b":1},"c":2}"#),
            vec!["a", "a.b", "c"]
        );
    }

    #[test]
    fn colons_inside_string_values_are_not_keys() {
        assert_eq!(scan(br#"{"url":"https://example.com"}"#), vec!["url"]);
    }

    #[test]
    fn whitespace_between_key_and_colon_is_tolerated() {
        assert_eq!(scan(b"{ \"a\" : { \"b\" : 1 } }"), vec!["a", "a.b"]);
    }

    #[test]
    fn objects_inside_arrays_extend_the_enclosing_path() {
        // Arrays are not distinguished from objects; a known precision gap.
        assert_eq!(
            scan(br#"{"items":[{"name":"x"}]}"#),
            vec!["items", "items.name"]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_split_keys() {
        let input = br#"{"outer":{"inner":42}}"#;
        let mut scanner = FieldScanner::new();
        let mut paths = Vec::new();
        for chunk in input.chunks(3) {
            scanner.feed(chunk, |p| paths.push(p.to_string()));
        }
        assert_eq!(paths, vec!["outer", "outer.inner"]);
    }

    struct CollectSink(Mutex<Vec<(String, String)>>);

    impl IndexSink for CollectSink {
        fn index(&self, hook_id: &str, field_path: &str) {
            self.0.lock().push((hook_id.into(), field_path.into()));
        }
    }

    #[tokio::test]
    async fn index_stream_reports_hook_id_and_paths() {
        let sink = CollectSink(Mutex::new(Vec::new()));
        let n = index_stream(Cursor::new(br#"{"a":{"b":1}}"#.to_vec()), "hk_1", &sink)
            .await
            .expect("scan");
        assert_eq!(n, 13);
        let entries = sink.0.lock();
        assert_eq!(
            *entries,
            vec![
                ("hk_1".to_string(), "a".to_string()),
                ("hk_1".to_string(), "a.b".to_string())
            ]
        );
    }
}
