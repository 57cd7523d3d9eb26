use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(ShopId);
opaque_id!(AccountUserId);
opaque_id!(Uid);
opaque_id!(ConversationId);

/// `shop_id:from_uid` — the unit of per-user serial ordering (§3 GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(pub String);

impl UserKey {
    pub fn new(shop_id: &ShopId, from_uid: &str) -> Self {
        Self(format!("{}:{}", shop_id, from_uid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(channel, shop_id, account_user_id)` — the at-most-one-session key (§3 invariant 1,
/// §4.10's keyed mutex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountKey {
    pub channel: String,
    pub shop_id: ShopId,
    pub account_user_id: AccountUserId,
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.channel, self.shop_id, self.account_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_format() {
        let key = UserKey::new(&ShopId::new("shop1"), "U1");
        assert_eq!(key.as_str(), "shop1:U1");
    }

    #[test]
    fn account_key_display() {
        let key = AccountKey {
            channel: "pinduoduo".into(),
            shop_id: ShopId::new("shop1"),
            account_user_id: AccountUserId::new("acc1"),
        };
        assert_eq!(key.to_string(), "pinduoduo:shop1:acc1");
    }
}
