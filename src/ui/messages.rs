//! On-screen message queue
//!
//! Recoverable failures (hot reload errors, autosave results) end up here
//! instead of in dialogs. Every message is also logged.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
    /// Seconds left on screen
    pub remaining: f32,
}

#[derive(Debug)]
pub struct MessageQueue {
    messages: Vec<Message>,
    lifetime: f32,
    capacity: usize,
}

impl MessageQueue {
    pub fn new(lifetime: f32, capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            lifetime,
            capacity: capacity.max(1),
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("[Messages] {}", text);
        self.push(MessageLevel::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::warn!("[Messages] {}", text);
        self.push(MessageLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::error!("[Messages] {}", text);
        self.push(MessageLevel::Error, text);
    }

    fn push(&mut self, level: MessageLevel, text: String) {
        if self.messages.len() == self.capacity {
            self.messages.remove(0);
        }
        self.messages.push(Message {
            level,
            text,
            remaining: self.lifetime,
        });
    }

    /// Age every message by `dt` seconds and drop the expired ones
    pub fn update(&mut self, dt: f32) {
        for message in self.messages.iter_mut() {
            message.remaining -= dt;
        }
        self.messages.retain(|message| message.remaining > 0.0);
    }

    /// Messages oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn errors(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.level == MessageLevel::Error)
            .count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(5.0, 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_expire() {
        let mut queue = MessageQueue::new(1.0, 8);
        queue.info("saved");
        queue.update(0.5);
        queue.error("failed");
        assert_eq!(queue.len(), 2);

        queue.update(0.6);
        let texts: Vec<&str> = queue.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["failed"]);
        assert_eq!(queue.errors(), 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut queue = MessageQueue::new(10.0, 2);
        queue.info("a");
        queue.warn("b");
        queue.info("c");
        let texts: Vec<&str> = queue.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }
}
