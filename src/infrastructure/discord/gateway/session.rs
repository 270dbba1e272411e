/// Resumable session: identity handed out by READY plus the last sequence seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    session_id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
}

impl SessionInfo {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_id: None,
            resume_url: None,
            sequence: None,
        }
    }

    /// Starts a fresh session. The sequence was already recorded from the READY frame.
    pub fn begin(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
    }

    /// Records a frame's sequence number. Out-of-order values are ignored.
    pub fn record_sequence(&mut self, sequence: Option<u64>) {
        if let Some(seq) = sequence
            && self.sequence.is_none_or(|last| seq > last)
        {
            self.sequence = Some(seq);
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    #[must_use]
    pub const fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    #[must_use]
    pub const fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_requires_session_and_sequence() {
        let mut session = SessionInfo::new();
        assert!(!session.can_resume());

        session.begin("abc".into(), Some("wss://resume".into()));
        assert!(!session.can_resume());

        session.record_sequence(Some(3));
        assert!(session.can_resume());
        assert_eq!(session.resume_url(), Some("wss://resume"));
    }

    #[test]
    fn test_sequence_only_moves_forward() {
        let mut session = SessionInfo::new();
        session.record_sequence(Some(5));
        session.record_sequence(None);
        session.record_sequence(Some(4));
        assert_eq!(session.sequence(), Some(5));

        session.record_sequence(Some(6));
        assert_eq!(session.sequence(), Some(6));

        session.clear();
        assert_eq!(session, SessionInfo::new());
    }
}
