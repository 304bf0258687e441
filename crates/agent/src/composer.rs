use crate::orchestrator::Intent;

/// Text being typed into the composer, not yet part of the transcript
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.draft.push_str(text);
    }

    pub fn clear(&mut self) {
        self.draft.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.draft.trim().is_empty()
    }

    /// Send is enabled when the draft has content and nothing is generating
    pub fn can_send(&self, generating: bool) -> bool {
        !self.is_blank() && !generating
    }

    /// Turn the draft into a submit intent, emptying the composer.
    ///
    /// Returns `None` and keeps the draft when sending is not possible.
    pub fn take_submission(&mut self, generating: bool) -> Option<Intent> {
        if !self.can_send(generating) {
            return None;
        }
        Some(Intent::Submit(std::mem::take(&mut self.draft)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_draft_cannot_send() {
        let mut composer = Composer::new();
        assert!(!composer.can_send(false));

        composer.set("  \n");
        assert!(composer.is_blank());
        assert!(composer.take_submission(false).is_none());
        assert_eq!(composer.draft(), "  \n");
    }

    #[test]
    fn test_take_submission_clears_draft() {
        let mut composer = Composer::new();
        composer.set("What are the trends?");

        let intent = composer.take_submission(false);
        assert_eq!(intent, Some(Intent::Submit("What are the trends?".to_string())));
        assert_eq!(composer.draft(), "");
    }

    #[test]
    fn test_draft_kept_while_generating() {
        let mut composer = Composer::new();
        composer.set("follow up");
        composer.push_str(" question");

        assert!(!composer.can_send(true));
        assert!(composer.take_submission(true).is_none());
        assert_eq!(composer.draft(), "follow up question");
    }
}
