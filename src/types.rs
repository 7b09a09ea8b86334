use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── API records ────────────────────────────────────────────────────
//
// Only the fields the notifier reads are modeled; everything else the API
// returns is ignored.

/// Every API response wraps its payload in `{"response": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Campaign detail (`/campaigns/{id}.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub goal: Decimal,
    #[serde(default)]
    pub collected_funds: Decimal,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub thumbnail_image_url: Option<String>,
}

/// Reward tier (`/campaigns/{id}/perks.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Perk {
    pub id: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub number_claimed: Option<u32>,
    /// `null` or `0` for unlimited perks.
    #[serde(default)]
    pub number_available: Option<u32>,
}

impl Perk {
    pub fn claimed(&self) -> u32 {
        self.number_claimed.unwrap_or(0)
    }

    /// Stock limit, or `None` when the perk is unlimited.
    pub fn limit(&self) -> Option<u32> {
        self.number_available.filter(|&n| n > 0)
    }
}

/// Campaign comment (`/campaigns/{id}/comments.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub text: String,
    pub created_at: String,
    #[serde(default)]
    pub account: Option<CommentAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentAuthor {
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Contribution to the campaign (`/campaigns/{id}/contributions.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Contribution {
    pub id: u64,
    /// Display name of the contributor.
    #[serde(default)]
    pub by: String,
    #[serde(default)]
    pub amount: Decimal,
    pub created_at: String,
    /// `null` when the backer contributed without selecting a perk.
    #[serde(default)]
    pub perk: Option<ContributionPerk>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributionPerk {
    #[serde(default)]
    pub label: String,
}

/// The authenticated account (`/me.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: u64,
}

/// OAuth token pair returned by the auth server.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// ── Notification payloads ──────────────────────────────────────────

/// Attachment color understood by the chat webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatColor {
    Good,
    Warning,
    Danger,
}

/// One row of the chat message field table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl ChatField {
    pub fn new(title: &str, value: impl ToString) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: false,
        }
    }
}

/// Body posted to the chat webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub pretext: String,
    pub text: String,
    pub color: ChatColor,
    /// Serialized as `null` when empty.
    #[serde(serialize_with = "fields_or_null")]
    pub fields: Vec<ChatField>,
    pub parse: &'static str,
}

fn fields_or_null<S: serde::Serializer>(fields: &[ChatField], s: S) -> Result<S::Ok, S::Error> {
    if fields.is_empty() {
        s.serialize_none()
    } else {
        s.collect_seq(fields)
    }
}

/// Automation trigger: event name plus the three free-form values.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationTrigger {
    pub event: &'static str,
    pub text: String,
    pub link: String,
    pub image_url: String,
}

/// Body posted to the automation webhook.
#[derive(Debug, Serialize)]
pub struct AutomationPayload<'a> {
    pub value1: &'a str,
    pub value2: &'a str,
    pub value3: &'a str,
}

impl AutomationTrigger {
    pub fn payload(&self) -> AutomationPayload<'_> {
        AutomationPayload {
            value1: &self.text,
            value2: &self.link,
            value3: &self.image_url,
        }
    }
}

/// One detected event, rendered for both sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub chat: ChatMessage,
    pub trigger: AutomationTrigger,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn campaign_ignores_unknown_fields() {
        let c: Campaign = serde_json::from_value(json!({
            "id": 42,
            "title": "Smart Mug",
            "slug": "smart-mug",
            "goal": 10000,
            "collected_funds": 3050.5,
            "currency": {"iso_code": "USD"},
            "preview_url": "https://example.com/p",
        }))
        .unwrap();
        assert_eq!(c.id, 42);
        assert_eq!(c.goal, dec!(10000));
        assert_eq!(c.collected_funds, dec!(3050.5));
        assert!(c.thumbnail_image_url.is_none());
    }

    #[test]
    fn perk_unlimited_when_available_null_or_zero() {
        let p: Perk = serde_json::from_value(json!({
            "id": 1, "label": "Mug", "number_claimed": 5, "number_available": null
        }))
        .unwrap();
        assert_eq!(p.limit(), None);

        let p: Perk = serde_json::from_value(json!({
            "id": 1, "label": "Mug", "number_claimed": 5, "number_available": 0
        }))
        .unwrap();
        assert_eq!(p.limit(), None);

        let p: Perk = serde_json::from_value(json!({"id": 2, "number_available": 50})).unwrap();
        assert_eq!(p.limit(), Some(50));
        assert_eq!(p.claimed(), 0);
    }

    #[test]
    fn contribution_without_perk() {
        let c: Contribution = serde_json::from_value(json!({
            "id": 7,
            "by": "Jane",
            "amount": 25,
            "created_at": "2015-06-10T17:23:36-07:00",
            "perk": null
        }))
        .unwrap();
        assert!(c.perk.is_none());
        assert!(c.avatar_url.is_none());
        assert_eq!(c.amount, dec!(25));
    }

    #[test]
    fn chat_message_serialization() {
        let msg = ChatMessage {
            pretext: "New comment".into(),
            text: "hi".into(),
            color: ChatColor::Warning,
            fields: vec![],
            parse: "full",
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({
                "pretext": "New comment",
                "text": "hi",
                "color": "warning",
                "fields": null,
                "parse": "full"
            })
        );

        let msg = ChatMessage {
            fields: vec![ChatField::new("Claimed", 91)],
            ..msg
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v["fields"],
            json!([{"title": "Claimed", "value": "91", "short": false}])
        );
    }

    #[test]
    fn automation_payload_shape() {
        let t = AutomationTrigger {
            event: "igg-comments",
            text: "t".into(),
            link: "l".into(),
            image_url: "i".into(),
        };
        let v = serde_json::to_value(t.payload()).unwrap();
        assert_eq!(v, json!({"value1": "t", "value2": "l", "value3": "i"}));
    }
}
