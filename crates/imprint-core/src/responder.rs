//! Reply generation for the chat log
//!
//! The chat log does not know how replies are produced. It asks a `Responder`
//! for one reply per accepted user message; the delay before the reply is
//! appended is imposed by the chat log, not by the responder.

use rand::seq::IndexedRandom;

/// Produces the assistant reply for a user prompt.
pub trait Responder: Send + Sync {
    fn respond(&self, prompt: &str) -> String;
}

impl<F> Responder for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn respond(&self, prompt: &str) -> String {
        self(prompt)
    }
}

/// Replies used by `CannedResponder`.
pub const CANNED_REPLIES: [&str; 5] = [
    "That's an interesting question! Let me explain in detail based on what I've learned.",
    "You've raised a good point. Let's dig into it a little deeper.",
    "Got it. There's something related I can add to that.",
    "Exactly! Based on the patterns I've learned, here is something more useful.",
    "This is a really important concept. Let me walk you through it step by step.",
];

/// Picks one of `CANNED_REPLIES` at random, ignoring the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResponder;

impl Responder for CannedResponder {
    fn respond(&self, _prompt: &str) -> String {
        CANNED_REPLIES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(CANNED_REPLIES[0])
            .to_string()
    }
}
