//! Conversation context with a pinned preamble and paired eviction

use autoplay_llm::{ContentPart, Message, Role};

const CHARS_PER_TOKEN: f32 = 4.0;
/// Flat cost charged for a low-detail image part.
const IMAGE_TOKENS: usize = 85;

/// Handle to one pushed message, used to roll it back later.
pub type EntryId = u64;

#[derive(Debug, Clone)]
struct Entry {
    id: EntryId,
    message: Message,
}

/// Bounded, ordered message history supplied to the completion service.
///
/// Index 0 may hold a pinned system preamble. Eviction removes the oldest
/// non-pinned entries two at a time, so request/reply pairs leave together.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    entries: Vec<Entry>,
    pinned: bool,
    max_messages: usize,
    next_id: EntryId,
}

impl ConversationContext {
    pub fn new(max_messages: usize) -> Self {
        Self {
            entries: Vec::new(),
            pinned: false,
            max_messages,
            next_id: 0,
        }
    }

    pub fn with_preamble(preamble: Option<&str>, max_messages: usize) -> Self {
        Self::from_messages(Vec::new(), preamble, max_messages)
    }

    /// Rebuild a context from stored records. When a preamble is given it is pinned at
    /// index 0, replacing a stored system preamble in that slot.
    pub fn from_messages(messages: Vec<Message>, preamble: Option<&str>, max_messages: usize) -> Self {
        let mut context = Self::new(max_messages);
        let mut messages = messages.into_iter().peekable();
        if let Some(text) = preamble {
            if messages.peek().is_some_and(|m| m.role == Role::System) {
                messages.next();
            }
            context.push(Message::system(text));
            context.pinned = true;
        }
        for message in messages {
            context.push(message);
        }
        context
    }

    pub fn estimate_tokens(text: &str) -> usize {
        (text.len() as f32 / CHARS_PER_TOKEN).ceil() as usize
    }

    pub fn message_tokens(message: &Message) -> usize {
        let content_tokens: usize = message
            .content
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => Self::estimate_tokens(text),
                ContentPart::Image { .. } => IMAGE_TOKENS,
            })
            .sum();
        content_tokens + 10
    }

    pub fn approx_tokens(&self) -> usize {
        self.entries.iter().map(|e| Self::message_tokens(&e.message)).sum()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn push(&mut self, message: Message) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry { id, message });
        id
    }

    /// Insert `message` directly after the entry `id`, keeping a reply next to its
    /// request when other requests finished first. Returns `None` if `id` was evicted.
    pub fn insert_after(&mut self, id: EntryId, message: Message) -> Option<EntryId> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let new_id = self.next_id;
        self.next_id += 1;
        self.entries.insert(index + 1, Entry { id: new_id, message });
        Some(new_id)
    }

    /// Remove a previously pushed message. The pinned preamble cannot be removed.
    pub fn remove(&mut self, id: EntryId) -> Option<Message> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        if self.pinned && index == 0 {
            return None;
        }
        Some(self.entries.remove(index).message)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    /// Evict until within `max_messages`. Returns the number of messages removed.
    pub fn trim(&mut self) -> usize {
        let floor = usize::from(self.pinned);
        let mut evicted = 0;
        while self.entries.len() > self.max_messages && self.entries.len() > floor {
            let end = (floor + 2).min(self.entries.len());
            evicted += end - floor;
            self.entries.drain(floor..end);
        }
        if evicted > 0 {
            tracing::info!(
                "Trimmed context: evicted {}, {} messages, ~{} tokens",
                evicted,
                self.entries.len(),
                self.approx_tokens()
            );
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> Message {
        Message::user(vec![ContentPart::text(text)])
    }

    #[test]
    fn test_token_estimation() {
        assert_eq!(ConversationContext::estimate_tokens("hello"), 2);
        assert_eq!(ConversationContext::estimate_tokens("hello world"), 3);
    }

    #[test]
    fn image_parts_cost_flat_tokens() {
        let frame = autoplay_core::Frame::new("image/png", vec![0; 4096]);
        let msg = Message::user(vec![ContentPart::image(&frame)]);
        assert_eq!(ConversationContext::message_tokens(&msg), IMAGE_TOKENS + 10);
    }

    #[test]
    fn trim_never_evicts_pinned_preamble() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 3);
        for i in 0..10 {
            ctx.push(user(&format!("m{}", i)));
            ctx.trim();
            assert_eq!(ctx.iter().next().unwrap().text(), "rules");
            assert!(ctx.len() <= 3);
        }
    }

    #[test]
    fn trim_removes_two_oldest_together() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 5);
        for i in 0..5 {
            ctx.push(user(&format!("m{}", i)));
        }
        assert_eq!(ctx.len(), 6);
        assert_eq!(ctx.trim(), 2);
        let texts: Vec<String> = ctx.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["rules", "m2", "m3", "m4"]);
    }

    #[test]
    fn trim_without_pin_starts_at_zero() {
        let mut ctx = ConversationContext::new(2);
        for i in 0..3 {
            ctx.push(user(&format!("m{}", i)));
        }
        ctx.trim();
        let texts: Vec<String> = ctx.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["m2"]);
    }

    #[test]
    fn trim_under_cap_is_noop() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 10);
        ctx.push(user("a"));
        assert_eq!(ctx.trim(), 0);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn remove_rolls_back_specific_entry() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 10);
        let a = ctx.push(user("a"));
        let b = ctx.push(user("b"));
        assert_eq!(ctx.remove(a).unwrap().text(), "a");
        assert!(ctx.remove(a).is_none());
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.remove(b).unwrap().text(), "b");
    }

    #[test]
    fn insert_after_keeps_reply_beside_its_request() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 10);
        let first = ctx.push(user("first"));
        let second = ctx.push(user("second"));
        ctx.insert_after(second, Message::system("second reply")).unwrap();
        let reply = ctx.insert_after(first, Message::system("first reply")).unwrap();

        let texts: Vec<String> = ctx.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["rules", "first", "first reply", "second", "second reply"]);
        assert_eq!(ctx.remove(reply).unwrap().text(), "first reply");
    }

    #[test]
    fn insert_after_evicted_entry_is_refused() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 10);
        let gone = ctx.push(user("a"));
        ctx.remove(gone);
        assert!(ctx.insert_after(gone, Message::system("late")).is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn remove_refuses_pinned() {
        let mut ctx = ConversationContext::with_preamble(Some("rules"), 10);
        assert!(ctx.remove(0).is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn from_messages_replaces_stored_preamble() {
        let stored = vec![Message::system("old rules"), user("a"), Message::system("reply")];
        let ctx = ConversationContext::from_messages(stored, Some("new rules"), 10);
        let texts: Vec<String> = ctx.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["new rules", "a", "reply"]);
        assert!(ctx.is_pinned());
    }
}
