//! Redis key layout: `[<prefix>:]fsm:meta:<key>` (hash) and `[<prefix>:]fsm:data:<key>` (JSON string).

const META_SEGMENT: &str = "fsm:meta";
const DATA_SEGMENT: &str = "fsm:data";

#[derive(Debug, Clone)]
pub(crate) struct KeySpace {
    base: String,
}

impl KeySpace {
    pub(crate) fn new(prefix: &str) -> Self {
        let base = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}:", prefix)
        };
        Self { base }
    }

    pub(crate) fn meta(&self, key: &str) -> String {
        format!("{}{}:{}", self.base, META_SEGMENT, key)
    }

    pub(crate) fn data(&self, key: &str) -> String {
        format!("{}{}:{}", self.base, DATA_SEGMENT, key)
    }

    /// SCAN pattern matching every metadata key.
    pub(crate) fn meta_pattern(&self) -> String {
        format!("{}{}:*", self.base, META_SEGMENT)
    }

    /// Conversation key of a full metadata key.
    pub(crate) fn conversation_key<'a>(&self, meta_key: &'a str) -> Option<&'a str> {
        meta_key
            .strip_prefix(self.base.as_str())?
            .strip_prefix(META_SEGMENT)?
            .strip_prefix(':')
    }
}
