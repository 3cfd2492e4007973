use feedscout_types::normalize_text;

/// Pending candidate carried between analysis passes by the loop driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmState {
    pub pending_key: Option<String>,
    pub pending_count: u32,
}

/// Requires a candidate key to repeat over consecutive analysis passes
/// before it may be acted on.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationDebouncer {
    required_frames: u32,
}

impl ConfirmationDebouncer {
    pub fn new(required_frames: u32) -> Self {
        Self {
            required_frames: required_frames.max(1),
        }
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    pub fn update(&self, state: ConfirmState, key: &str) -> (ConfirmState, bool) {
        update_confirm(state, key, self.required_frames)
    }
}

/// One debounce step. Blank keys leave the state untouched and are never
/// ready; `required_frames` below one behaves like one.
pub fn update_confirm(state: ConfirmState, key: &str, required_frames: u32) -> (ConfirmState, bool) {
    let key = key.trim();
    if key.is_empty() {
        return (state, false);
    }
    if required_frames <= 1 {
        let next = ConfirmState {
            pending_key: Some(key.to_string()),
            pending_count: 1,
        };
        return (next, true);
    }

    let next = if state.pending_key.as_deref() == Some(key) {
        ConfirmState {
            pending_count: state.pending_count.saturating_add(1),
            ..state
        }
    } else {
        ConfirmState {
            pending_key: Some(key.to_string()),
            pending_count: 1,
        }
    };
    let ready = next.pending_count >= required_frames;
    (next, ready)
}

/// Debounce key of a card candidate: the signature prefix, or the
/// normalized title when there is no signature.
pub fn confirm_key(signature: &str, title: &str) -> String {
    if signature.is_empty() {
        normalize_text(title)
    } else {
        signature.chars().take(12).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(key: &str, count: u32) -> ConfirmState {
        ConfirmState {
            pending_key: Some(key.to_string()),
            pending_count: count,
        }
    }

    #[test]
    fn blank_key_is_never_ready() {
        for frames in 0..4 {
            let (state, ready) = update_confirm(ConfirmState::default(), "  ", frames);
            assert!(!ready);
            assert_eq!(state, ConfirmState::default());
        }
        let (state, ready) = update_confirm(pending("a", 1), "", 2);
        assert!(!ready);
        assert_eq!(state, pending("a", 1));
    }

    #[test]
    fn single_frame_confirms_immediately() {
        let (state, ready) = update_confirm(pending("k", 3), "k", 1);
        assert!(ready);
        assert_eq!(state, pending("k", 1));
        assert!(update_confirm(ConfirmState::default(), "abc", 0).1);
    }

    #[test]
    fn two_hits_confirm() {
        let (state, ready) = update_confirm(ConfirmState::default(), "p", 2);
        assert!(!ready);
        assert_eq!(state, pending("p", 1));
        let (state, ready) = update_confirm(state, "p", 2);
        assert!(ready);
        assert_eq!(state, pending("p", 2));
    }

    #[test]
    fn new_key_resets_the_streak() {
        let (state, ready) = update_confirm(pending("a", 1), "b", 2);
        assert!(!ready);
        assert_eq!(state, pending("b", 1));
    }

    #[test]
    fn interrupted_streak_never_confirms() {
        let debouncer = ConfirmationDebouncer::new(3);
        let mut state = ConfirmState::default();
        for _ in 0..debouncer.required_frames() - 1 {
            let (next, ready) = debouncer.update(state, "same");
            assert!(!ready);
            state = next;
        }
        let (state, ready) = debouncer.update(state, "other");
        assert!(!ready);
        assert_eq!(state, pending("other", 1));
    }

    #[test]
    fn confirm_key_prefers_signature_prefix() {
        let signature = "abc".repeat(20);
        assert_eq!(confirm_key(&signature, "TITLE"), "abcabcabcabc");
        assert_eq!(confirm_key("", "美团 大模型"), "美团大模型");
    }
}
