use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AccountUserId, ConversationId, ShopId};

/// Platform-visible availability status of a seat (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Unverified,
    /// platform code 0
    Rest,
    /// platform code 1
    Online,
    /// platform code 3
    Offline,
}

impl Presence {
    /// Platform wire code used by `set_presence` (§6.2).
    pub fn code(self) -> u8 {
        match self {
            Presence::Unverified => 255,
            Presence::Rest => 0,
            Presence::Online => 1,
            Presence::Offline => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Presence::Rest),
            1 => Some(Presence::Online),
            3 => Some(Presence::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Presence::Unverified => "unverified",
            Presence::Rest => "rest",
            Presence::Online => "online",
            Presence::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Presence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(Presence::Unverified),
            "rest" => Ok(Presence::Rest),
            "online" => Ok(Presence::Online),
            "offline" => Ok(Presence::Offline),
            other => Err(format!("unknown presence: {other}")),
        }
    }
}

/// One merchant seat identity with its own credentials (§3, C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub channel: String,
    pub shop_id: ShopId,
    pub account_user_id: AccountUserId,
    pub username: String,
    /// Never logged or serialized into diagnostics output.
    pub password: String,
    pub profile_dir: Option<String>,
    /// Opaque cookie/session bundle; treated as a single value.
    pub credentials: Option<Value>,
    pub presence: Presence,
    pub created_at: String,
    pub updated_at: String,
}

/// A merchant storefront; owns zero or more accounts (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub channel: String,
    pub shop_id: ShopId,
    pub name: String,
    pub logo: Option<String>,
    pub description: Option<String>,
}

/// `user_key -> conversation_id` mapping with the external agent (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub user_key: String,
    pub conversation_id: ConversationId,
    pub created_at: String,
}

/// A transfer-to-human trigger phrase (supplemental to spec.md, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub channel: String,
    pub keyword: String,
    pub created_at: String,
}

/// Decoded inbound message (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub msg_id: String,
    pub from_role: FromRole,
    pub from_uid: String,
    pub to_uid: String,
    pub nickname: Option<String>,
    /// monotonic epoch millis from server
    pub timestamp: i64,
    pub shop_id: ShopId,
    pub account_user_id: AccountUserId,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromRole {
    User,
    MallCs,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content")]
pub enum EventKind {
    Text { text: String },
    Image { url: String },
    Video { url: String },
    Emotion { description: String },
    GoodsInquiry {
        goods_id: Option<String>,
        name: Option<String>,
        price: Option<String>,
        thumb_url: Option<String>,
        link_url: Option<String>,
    },
    GoodsSpec {
        goods_id: Option<String>,
        name: Option<String>,
        price: Option<String>,
        spec: Option<String>,
    },
    OrderInfo {
        order_id: Option<String>,
        goods_id: Option<String>,
        name: Option<String>,
        after_sales_status: Option<String>,
        after_sales_type: Option<String>,
        spec: Option<String>,
    },
    GoodsCard { goods_id: String },
    Withdraw { hint: Option<String> },
    MallCs { text: Option<String> },
    MallSystemMsg { user_id: Option<String> },
    SystemStatus { text: String },
    SystemHint { text: String },
    SystemBiz { text: String },
    Auth {
        uid: Option<String>,
        result: Option<String>,
        status: Option<Value>,
    },
    Transfer {
        from_uid: Option<String>,
        to_uid: Option<String>,
    },
    Unknown { raw: Value },
}

/// How the consumer routes an event (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    Immediate,
    Queued,
    Dropped,
}

impl EventKind {
    pub fn routing_policy(&self) -> RoutingPolicy {
        match self {
            EventKind::Auth { .. }
            | EventKind::Withdraw { .. }
            | EventKind::SystemStatus { .. }
            | EventKind::SystemHint { .. }
            | EventKind::MallCs { .. }
            | EventKind::SystemBiz { .. }
            | EventKind::MallSystemMsg { .. }
            | EventKind::Transfer { .. } => RoutingPolicy::Immediate,

            EventKind::Text { .. }
            | EventKind::Image { .. }
            | EventKind::Video { .. }
            | EventKind::Emotion { .. }
            | EventKind::GoodsInquiry { .. }
            | EventKind::OrderInfo { .. }
            | EventKind::GoodsCard { .. }
            | EventKind::GoodsSpec { .. } => RoutingPolicy::Queued,

            EventKind::Unknown { .. } => RoutingPolicy::Dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_kinds_never_queued() {
        assert_eq!(
            EventKind::Withdraw { hint: None }.routing_policy(),
            RoutingPolicy::Immediate
        );
        assert_eq!(
            EventKind::Transfer { from_uid: None, to_uid: None }.routing_policy(),
            RoutingPolicy::Immediate
        );
    }

    #[test]
    fn queued_kinds() {
        assert_eq!(
            EventKind::Text { text: "hi".into() }.routing_policy(),
            RoutingPolicy::Queued
        );
    }

    #[test]
    fn unknown_is_dropped() {
        assert_eq!(
            EventKind::Unknown { raw: Value::Null }.routing_policy(),
            RoutingPolicy::Dropped
        );
    }

    #[test]
    fn presence_code_roundtrip() {
        assert_eq!(Presence::from_code(1), Some(Presence::Online));
        assert_eq!(Presence::Online.code(), 1);
        assert_eq!(Presence::from_code(2), None);
    }
}
