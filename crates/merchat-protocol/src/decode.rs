use merchat_core::ids::{AccountUserId, ShopId};
use merchat_core::{Event, EventKind, FromRole};
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::wire::RawFrame;

fn opt_str(v: &Value, path: &[&str]) -> Option<String> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str().map(|s| s.to_string())
}

/// Pure decode of one inbound text frame into a typed `Event` (§4.3).
/// `shop_id`/`account_user_id` are injected by the caller (the transport
/// session knows which account's socket this frame arrived on).
pub fn decode(frame_bytes: &[u8], shop_id: &ShopId, account_user_id: &AccountUserId) -> Result<Event> {
    let text = std::str::from_utf8(frame_bytes)
        .map_err(|e| DecodeError::MalformedJson(e.to_string()))?;
    let raw: Value = serde_json::from_str(text).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;
    let frame: RawFrame =
        serde_json::from_value(raw.clone()).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;

    let (from_role, from_uid, to_uid, msg_id, nickname, timestamp) = basic_info(&frame);
    let kind = classify(&frame, &raw, from_role);

    Ok(Event {
        kind,
        msg_id,
        from_role,
        from_uid,
        to_uid,
        nickname,
        timestamp,
        shop_id: shop_id.clone(),
        account_user_id: account_user_id.clone(),
        raw,
    })
}

fn basic_info(frame: &RawFrame) -> (FromRole, String, String, String, Option<String>, i64) {
    let msg = frame.message.as_ref();
    let from_role_str = msg.and_then(|m| m.from.as_ref()).and_then(|f| f.role.clone());
    let from_role = match from_role_str.as_deref() {
        Some("mall_cs") => FromRole::MallCs,
        Some("system") => FromRole::System,
        _ => FromRole::User,
    };
    let from_uid = msg
        .and_then(|m| m.from.as_ref())
        .and_then(|f| f.uid.clone())
        .unwrap_or_default();
    let to_uid = msg
        .and_then(|m| m.to.as_ref())
        .and_then(|t| t.uid.clone())
        .unwrap_or_default();
    let msg_id = msg.and_then(|m| m.msg_id.clone()).unwrap_or_default();
    let nickname = msg.and_then(|m| m.nickname.clone());
    let timestamp = msg.and_then(|m| m.time).unwrap_or(0);
    (from_role, from_uid, to_uid, msg_id, nickname, timestamp)
}

/// Table-driven classification, mirroring §4.3. `raw` is the whole parsed
/// frame (used for the deep `info`/`data` lookups the typed `RawMessage`
/// doesn't bother pre-extracting).
fn classify(frame: &RawFrame, raw: &Value, from_role: FromRole) -> EventKind {
    // mall_cs short-circuit: another seat's outbound overrides any type code.
    if from_role == FromRole::MallCs {
        let text = opt_str(raw, &["message", "content"]);
        return EventKind::MallCs { text };
    }

    match frame.response.as_deref() {
        Some("push") => classify_push(frame, raw),
        Some("auth") => EventKind::Auth {
            uid: frame.uid.clone(),
            result: frame.auth.as_ref().and_then(|a| a.result.clone()),
            status: frame.status.clone(),
        },
        Some("mall_system_msg") => EventKind::MallSystemMsg {
            user_id: opt_str(raw, &["message", "data", "user_id"]),
        },
        Some(other) => EventKind::SystemStatus {
            text: format!("unsupported: {other}"),
        },
        None => EventKind::SystemStatus {
            text: "unsupported: <missing response>".to_string(),
        },
    }
}

fn classify_push(frame: &RawFrame, raw: &Value) -> EventKind {
    let msg = match frame.message.as_ref() {
        Some(m) => m,
        None => return EventKind::SystemStatus { text: "unsupported: push with no message".to_string() },
    };

    match msg.msg_type {
        Some(0) => match msg.sub_type {
            Some(1) => EventKind::OrderInfo {
                order_id: opt_str(raw, &["message", "info", "orderSequenceNo"]),
                goods_id: opt_str(raw, &["message", "info", "goodsID"]),
                name: opt_str(raw, &["message", "info", "goodsName"]),
                after_sales_status: opt_str(raw, &["message", "info", "afterSalesStatus"]),
                after_sales_type: opt_str(raw, &["message", "info", "afterSalesType"]),
                spec: opt_str(raw, &["message", "info", "spec"]),
            },
            Some(0) => EventKind::GoodsInquiry {
                goods_id: opt_str(raw, &["message", "info", "goodsID"]),
                name: opt_str(raw, &["message", "info", "goodsName"]),
                price: opt_str(raw, &["message", "info", "goodsPrice"]),
                thumb_url: opt_str(raw, &["message", "info", "goodsThumbUrl"]),
                link_url: opt_str(raw, &["message", "info", "linkUrl"]),
            },
            _ => EventKind::Text {
                text: opt_str(raw, &["message", "content"]).unwrap_or_default(),
            },
        },
        Some(1) => EventKind::Image {
            url: opt_str(raw, &["message", "content"]).unwrap_or_default(),
        },
        Some(14) => EventKind::Video {
            url: opt_str(raw, &["message", "content"]).unwrap_or_default(),
        },
        Some(1002) => EventKind::Withdraw {
            hint: opt_str(raw, &["message", "info", "withdraw_hint"]),
        },
        Some(5) => EventKind::Emotion {
            description: opt_str(raw, &["message", "info", "description"]).unwrap_or_default(),
        },
        Some(64) => EventKind::GoodsSpec {
            goods_id: opt_str(raw, &["message", "info", "data", "goodsID"]),
            name: opt_str(raw, &["message", "info", "data", "goodsName"]),
            price: opt_str(raw, &["message", "info", "data", "goodsPrice"]),
            spec: opt_str(raw, &["message", "info", "data", "spec"]),
        },
        Some(24) => EventKind::Transfer {
            from_uid: opt_str(raw, &["message", "from", "uid"]),
            to_uid: opt_str(raw, &["message", "to", "uid"]),
        },
        Some(other) => EventKind::SystemStatus {
            text: format!("unsupported type={other}"),
        },
        None => EventKind::SystemStatus {
            text: "unsupported: push with no type".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ShopId, AccountUserId) {
        (ShopId::new("shop1"), AccountUserId::new("cs1"))
    }

    #[test]
    fn decodes_text_message() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"push","message":{"type":0,"sub_type":2,"from":{"role":"user","uid":"U1"},"to":{"role":"mall_cs","uid":"CS1"},"msg_id":"m1","nickname":"n","time":1000,"content":"你好"}}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        assert_eq!(event.from_uid, "U1");
        assert_eq!(event.msg_id, "m1");
        match event.kind {
            EventKind::Text { text } => assert_eq!(text, "你好"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn decodes_withdraw_immediate() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"push","message":{"type":1002,"from":{"role":"user","uid":"U2"},"info":{"withdraw_hint":"w"}}}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        match event.kind {
            EventKind::Withdraw { hint } => assert_eq!(hint.as_deref(), Some("w")),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_code_yields_system_status() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"push","message":{"type":999,"from":{"role":"user","uid":"U3"}}}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        match event.kind {
            EventKind::SystemStatus { text } => assert!(text.contains("999")),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn mall_cs_short_circuits_regardless_of_type() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"push","message":{"type":0,"sub_type":2,"from":{"role":"mall_cs","uid":"CSOTHER"},"content":"hello from another seat"}}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        assert_eq!(event.from_role, FromRole::MallCs);
        match event.kind {
            EventKind::MallCs { text } => assert_eq!(text.as_deref(), Some("hello from another seat")),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn auth_frame_decodes() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"auth","uid":"U1","auth":{"result":"ok"},"status":1}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        match event.kind {
            EventKind::Auth { uid, result, .. } => {
                assert_eq!(uid.as_deref(), Some("U1"));
                assert_eq!(result.as_deref(), Some("ok"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_fails() {
        let (shop, acc) = ids();
        assert!(decode(b"not json", &shop, &acc).is_err());
    }

    #[test]
    fn unrecognized_top_level_shape_yields_system_status() {
        let (shop, acc) = ids();
        let frame = br#"{"response":"something_else"}"#;
        let event = decode(frame, &shop, &acc).unwrap();
        match event.kind {
            EventKind::SystemStatus { text } => assert!(text.contains("something_else")),
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
