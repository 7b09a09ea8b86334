//! Human-readable renderings of detected events.

use rust_decimal::Decimal;

use crate::WEB_BASE;
use crate::types::{
    Account, AutomationTrigger, Campaign, ChatColor, ChatField, ChatMessage, Comment,
    Contribution, Notification, Perk,
};

pub const COMMENTS_EVENT: &str = "igg-comments";
pub const CONTRIBUTIONS_EVENT: &str = "igg-contributions";
pub const STATUS_EVENT: &str = "igg-status";
pub const PERKS_EVENT: &str = "igg-perks-status";

/// Campaign facts resolved once at startup and used to build links.
#[derive(Debug, Clone, Default)]
pub struct CampaignContext {
    pub campaign_id: u64,
    pub slug: String,
    pub account_id: u64,
    pub preview_url: String,
    pub thumbnail_url: String,
}

impl CampaignContext {
    pub fn new(campaign: &Campaign, account: &Account) -> Self {
        Self {
            campaign_id: campaign.id,
            slug: campaign.slug.clone(),
            account_id: account.id,
            preview_url: campaign.preview_url.clone().unwrap_or_default(),
            thumbnail_url: campaign.thumbnail_image_url.clone().unwrap_or_default(),
        }
    }

    pub fn comment_url(&self, comment_id: u64) -> String {
        format!(
            "{WEB_BASE}/projects/{}/x/{}#/comments?id={comment_id}",
            self.slug, self.account_id
        )
    }

    pub fn contribution_url(&self, contribution_id: u64) -> String {
        format!(
            "{WEB_BASE}/command_center/{}#/contributions/{contribution_id}",
            self.slug
        )
    }
}

fn chat(pretext: &str, text: String, color: ChatColor, fields: Vec<ChatField>) -> ChatMessage {
    ChatMessage {
        pretext: pretext.to_string(),
        text,
        color,
        fields,
        parse: "full",
    }
}

pub fn comment(ctx: &CampaignContext, comment: &Comment) -> Notification {
    let escaped = comment.text.replace('\r', "").replace('\n', "\\n");
    Notification {
        chat: chat("New comment", escaped, ChatColor::Warning, Vec::new()),
        trigger: AutomationTrigger {
            event: COMMENTS_EVENT,
            text: comment.text.clone(),
            link: ctx.comment_url(comment.id),
            image_url: comment
                .account
                .as_ref()
                .and_then(|a| a.avatar_url.clone())
                .unwrap_or_default(),
        },
    }
}

pub fn contribution(ctx: &CampaignContext, contribution: &Contribution) -> Notification {
    let perk = contribution
        .perk
        .as_ref()
        .map(|p| p.label.as_str())
        .unwrap_or("No perk");
    let amount = format!("${}", format_funds(contribution.amount));
    Notification {
        chat: chat(
            "New contribution!",
            perk.to_string(),
            ChatColor::Good,
            vec![
                ChatField::new("Name", &contribution.by),
                ChatField::new("Value", &amount),
            ],
        ),
        trigger: AutomationTrigger {
            event: CONTRIBUTIONS_EVENT,
            text: format!("{perk} claimed by {} for {amount}", contribution.by),
            link: ctx.contribution_url(contribution.id),
            image_url: contribution.avatar_url.clone().unwrap_or_default(),
        },
    }
}

pub fn milestone(ctx: &CampaignContext, campaign: &Campaign, achieved: u32) -> Notification {
    let msg = format!(
        "\"{}\" reached {achieved}%: ${}",
        campaign.title,
        format_funds(campaign.collected_funds)
    );
    Notification {
        chat: chat("Campaign updates", msg.clone(), ChatColor::Good, Vec::new()),
        trigger: status_trigger(ctx, STATUS_EVENT, msg),
    }
}

pub fn perk_almost_sold_out(ctx: &CampaignContext, perk: &Perk, available: u32) -> Notification {
    Notification {
        chat: chat(
            "Sold-out warning.",
            format!("{} is almost sold out. @channel", perk.label),
            ChatColor::Danger,
            perk_fields(perk, available),
        ),
        trigger: status_trigger(
            ctx,
            PERKS_EVENT,
            format!(
                "{} is almost sold out. - {}/{available}",
                perk.label,
                perk.claimed()
            ),
        ),
    }
}

pub fn perk_sold_out(ctx: &CampaignContext, perk: &Perk, available: u32) -> Notification {
    Notification {
        chat: chat(
            "Sold-out warning.",
            format!("{} is sold out!! @channel", perk.label),
            ChatColor::Danger,
            perk_fields(perk, available),
        ),
        trigger: status_trigger(
            ctx,
            PERKS_EVENT,
            format!(
                "{} is completely sold out. - {}/{available}",
                perk.label,
                perk.claimed()
            ),
        ),
    }
}

fn perk_fields(perk: &Perk, available: u32) -> Vec<ChatField> {
    vec![
        ChatField::new("Claimed", perk.claimed()),
        ChatField::new("Availability", available),
    ]
}

fn status_trigger(ctx: &CampaignContext, event: &'static str, text: String) -> AutomationTrigger {
    AutomationTrigger {
        event,
        text,
        link: ctx.preview_url.clone(),
        image_url: ctx.thumbnail_url.clone(),
    }
}

fn format_funds(funds: Decimal) -> String {
    funds.normalize().to_string()
}
