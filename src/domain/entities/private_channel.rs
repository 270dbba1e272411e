//! One-to-one private (direct message) channel.

use serde::{Deserialize, Serialize};

use super::{ChannelId, UserId};

/// Direct message channel with a single recipient.
///
/// The cache keys these by recipient, so at most one exists per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrivateChannel {
    id: ChannelId,
    recipient_id: UserId,
}

impl PrivateChannel {
    #[must_use]
    pub fn new(id: impl Into<ChannelId>, recipient_id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            recipient_id: recipient_id.into(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    #[must_use]
    pub const fn recipient_id(&self) -> UserId {
        self.recipient_id
    }
}
