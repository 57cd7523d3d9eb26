use merchat_core::EventKind;
use serde_json::{json, Value};

/// Builds the normalized prompt text for an event kind (§4.9's table).
/// Returns `None` for kinds the agent has no normalized form for — callers
/// should not reach the agent adapter for those in the first place, since
/// the handler chain only routes supported types here.
pub fn normalize(kind: &EventKind) -> Option<String> {
    match kind {
        EventKind::Text { text } => Some(text.clone()),
        EventKind::Emotion { description } => Some(format!("表情: {description}")),
        EventKind::Image { url } => Some(format!("图片: {url}")),
        EventKind::Video { url } => Some(format!("视频: {url}")),
        EventKind::GoodsInquiry { name, price, .. } => Some(format!(
            "商品：{},商品价格：{},商品规格：",
            name.as_deref().unwrap_or(""),
            price.as_deref().unwrap_or("")
        )),
        EventKind::GoodsSpec { name, price, spec, .. } => Some(format!(
            "商品：{},商品价格：{},商品规格：{}",
            name.as_deref().unwrap_or(""),
            price.as_deref().unwrap_or(""),
            spec.as_deref().unwrap_or("")
        )),
        EventKind::OrderInfo { order_id, name, .. } => Some(format!(
            "订单：{}，商品：{}",
            order_id.as_deref().unwrap_or(""),
            name.as_deref().unwrap_or("")
        )),
        _ => None,
    }
}

/// Wraps a normalized prompt as the single-element content-part array the
/// external agent expects.
pub fn to_content_parts(prompt: &str) -> Value {
    json!([{ "type": "text", "text": prompt }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_passes_through() {
        assert_eq!(normalize(&EventKind::Text { text: "hi".into() }), Some("hi".into()));
    }

    #[test]
    fn emotion_prefixed() {
        assert_eq!(
            normalize(&EventKind::Emotion { description: "笑哭".into() }),
            Some("表情: 笑哭".into())
        );
    }

    #[test]
    fn order_info_format() {
        let kind = EventKind::OrderInfo {
            order_id: Some("O1".into()),
            goods_id: None,
            name: Some("耳机".into()),
            after_sales_status: None,
            after_sales_type: None,
            spec: None,
        };
        assert_eq!(normalize(&kind), Some("订单：O1，商品：耳机".into()));
    }

    #[test]
    fn unsupported_kind_returns_none() {
        assert_eq!(normalize(&EventKind::Unknown { raw: serde_json::Value::Null }), None);
    }
}
