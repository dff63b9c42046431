//! Strips model "thinking" out of a streamed reply.
//!
//! Reasoning models wrap their scratchpad in `<think>…</think>`. The filter
//! re-cleans the whole accumulated text on every delta and emits only what
//! has not been emitted yet, so a block split across deltas never leaks.
//! A trailing fragment that could still grow into `<think>` is held back
//! until the next delta settles it.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

#[derive(Debug, Default)]
pub struct ThinkFilter {
    raw: String,
    emitted: usize,
}

impl ThinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw delta; returns the newly visible text, if any.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.raw.push_str(delta);
        let cleaned = strip_think(&self.raw);
        let visible = without_partial_open_tag(cleaned.trim_start()).trim_end();
        self.emit_up_to(visible)
    }

    /// Release whatever was held back once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let cleaned = self.cleaned();
        self.emit_up_to(&cleaned)
    }

    fn emit_up_to(&mut self, visible: &str) -> Option<String> {
        if visible.len() <= self.emitted {
            return None;
        }
        let fresh = visible.get(self.emitted..)?.to_string();
        self.emitted = visible.len();
        Some(fresh)
    }

    /// Everything visible so far.
    pub fn cleaned(&self) -> String {
        strip_think(&self.raw).trim().to_string()
    }

    /// The unfiltered model output.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Cut a trailing proper prefix of `<think>` (`<`, `<th`, ...).
fn without_partial_open_tag(text: &str) -> &str {
    (1..OPEN_TAG.len())
        .rev()
        .find(|&n| text.ends_with(&OPEN_TAG[..n]))
        .map_or(text, |n| &text[..text.len() - n])
}

/// Remove complete `<think>` blocks, then any unterminated trailing one.
pub fn strip_think(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN_TAG) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN_TAG.len()..];
        match after_open.find(CLOSE_TAG) {
            Some(end) => rest = &after_open[end + CLOSE_TAG.len()..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}
