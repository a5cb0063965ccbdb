use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::{ItemInfo, Listing};

pub const ASSETS_BASE_URL: &str = "https://warframe.market/static/assets/";
pub const PROFILE_BASE_URL: &str = "https://warframe.market/profile/";
pub const ITEMS_BASE_URL: &str = "https://warframe.market/items/";
const DEFAULT_AVATAR: &str = "user/default-avatar.webp";

pub const EMBED_COLOR: u32 = 0xe362ab;

/// Everything the sinks need for one qualifying listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub item_slug: String,
    pub listing_id: String,
    /// Console line.
    pub message: String,
    /// In-game whisper, copied to the clipboard.
    pub whisper: String,
    pub webhook_payload: Value,
}

impl NotificationEvent {
    pub fn compose(info: &ItemInfo, listing: &Listing, ping_ids: &[u64]) -> Self {
        Self::compose_at(info, listing, ping_ids, Utc::now())
    }

    pub fn compose_at(
        info: &ItemInfo,
        listing: &Listing,
        ping_ids: &[u64],
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = display_title(info, listing);
        let whisper = format!(
            "/w {} Hi! I want to buy: \"{}\" for {} platinum. (warframe.market)",
            listing.seller.ingame_name, title, listing.price
        );

        let message = format!(
            "💰 {} for {}p by {} ({}) | {}",
            title, listing.price, listing.seller.ingame_name, listing.seller.status, whisper
        );

        let summary = format!(
            "{} listed for {} platinum by {}",
            title, listing.price, listing.seller.ingame_name
        );
        let content = if ping_ids.is_empty() {
            summary
        } else {
            let mentions: Vec<String> = ping_ids.iter().map(|id| format!("<@{}>", id)).collect();
            format!("{} {}", mentions.join(" "), summary)
        };

        Self {
            item_slug: listing.item_slug.clone(),
            listing_id: listing.id.clone(),
            message,
            whisper,
            webhook_payload: json!({
                "content": content,
                "embeds": [build_embed(info, listing, &title, timestamp)],
            }),
        }
    }
}

fn display_title(info: &ItemInfo, listing: &Listing) -> String {
    match listing.rank {
        Some(rank) => format!("{} (rank {})", info.name, rank),
        None => info.name.clone(),
    }
}

fn build_embed(
    info: &ItemInfo,
    listing: &Listing,
    title: &str,
    timestamp: DateTime<Utc>,
) -> Value {
    let avatar = listing.seller.avatar.as_deref().unwrap_or(DEFAULT_AVATAR);

    let mut fields = vec![json!({
        "name": "Platinum",
        "value": listing.price.to_string(),
        "inline": true,
    })];
    if listing.quantity > 1 {
        fields.push(json!({
            "name": "Quantity",
            "value": listing.quantity.to_string(),
            "inline": true,
        }));
    }

    let mut embed = json!({
        "title": title,
        "url": format!("{}{}?type=sell", ITEMS_BASE_URL, info.slug),
        "color": EMBED_COLOR,
        "timestamp": timestamp.to_rfc3339(),
        "author": {
            "name": listing.seller.ingame_name,
            "url": format!("{}{}", PROFILE_BASE_URL, listing.seller.slug),
            "icon_url": format!("{}{}", ASSETS_BASE_URL, avatar),
        },
        "fields": fields,
    });

    if let Some(icon) = &info.icon {
        embed["thumbnail"] = json!({ "url": format!("{}{}", ASSETS_BASE_URL, icon) });
    }

    embed
}
