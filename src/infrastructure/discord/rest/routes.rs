use std::fmt;

use crate::domain::entities::{ChannelId, MessageId};

/// Rate limit key shared by gateway commands, which never hit HTTP.
pub const GATEWAY_BUCKET: &str = "gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// REST endpoints used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GetGateway,
    GetCurrentUser,
    ModifyCurrentUser,
    CreatePrivateChannel,
    CreateMessage {
        channel_id: ChannelId,
    },
    EditMessage {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    DeleteMessage {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    TriggerTyping {
        channel_id: ChannelId,
    },
}

impl Route {
    #[must_use]
    pub const fn method(self) -> HttpMethod {
        match self {
            Self::GetGateway | Self::GetCurrentUser => HttpMethod::Get,
            Self::ModifyCurrentUser | Self::EditMessage { .. } => HttpMethod::Patch,
            Self::CreatePrivateChannel | Self::CreateMessage { .. } | Self::TriggerTyping { .. } => {
                HttpMethod::Post
            }
            Self::DeleteMessage { .. } => HttpMethod::Delete,
        }
    }

    /// Path relative to the API base.
    #[must_use]
    pub fn path(self) -> String {
        match self {
            Self::GetGateway => "/gateway".to_string(),
            Self::GetCurrentUser | Self::ModifyCurrentUser => "/users/@me".to_string(),
            Self::CreatePrivateChannel => "/users/@me/channels".to_string(),
            Self::CreateMessage { channel_id } => format!("/channels/{channel_id}/messages"),
            Self::EditMessage {
                channel_id,
                message_id,
            }
            | Self::DeleteMessage {
                channel_id,
                message_id,
            } => format!("/channels/{channel_id}/messages/{message_id}"),
            Self::TriggerTyping { channel_id } => format!("/channels/{channel_id}/typing"),
        }
    }

    /// Rate limit key: method plus path with minor parameters collapsed.
    ///
    /// The channel id is a major parameter, so every channel gets its own
    /// bucket; message ids are not.
    #[must_use]
    pub fn bucket_key(self) -> String {
        let path = match self {
            Self::EditMessage { channel_id, .. } | Self::DeleteMessage { channel_id, .. } => {
                format!("/channels/{channel_id}/messages/:id")
            }
            other => other.path(),
        };
        format!("{} {path}", self.method())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Route::GetGateway, "GET", "/gateway" ; "gateway")]
    #[test_case(Route::ModifyCurrentUser, "PATCH", "/users/@me" ; "modify user")]
    #[test_case(Route::CreateMessage { channel_id: ChannelId(5) }, "POST", "/channels/5/messages" ; "create message")]
    #[test_case(Route::TriggerTyping { channel_id: ChannelId(5) }, "POST", "/channels/5/typing" ; "typing")]
    #[test_case(
        Route::DeleteMessage { channel_id: ChannelId(5), message_id: MessageId(9) },
        "DELETE",
        "/channels/5/messages/9" ;
        "delete message"
    )]
    fn test_route_method_and_path(route: Route, method: &str, path: &str) {
        assert_eq!(route.method().as_str(), method);
        assert_eq!(route.path(), path);
    }

    #[test]
    fn test_bucket_key_keeps_major_parameter_only() {
        let edit_a = Route::EditMessage {
            channel_id: ChannelId(5),
            message_id: MessageId(1),
        };
        let edit_b = Route::EditMessage {
            channel_id: ChannelId(5),
            message_id: MessageId(2),
        };
        let other_channel = Route::EditMessage {
            channel_id: ChannelId(6),
            message_id: MessageId(1),
        };
        let delete = Route::DeleteMessage {
            channel_id: ChannelId(5),
            message_id: MessageId(1),
        };

        assert_eq!(edit_a.bucket_key(), edit_b.bucket_key());
        assert_ne!(edit_a.bucket_key(), other_channel.bucket_key());
        assert_ne!(edit_a.bucket_key(), delete.bucket_key());
        assert_eq!(edit_a.bucket_key(), "PATCH /channels/5/messages/:id");
    }
}
