use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::scanner::SeenKey;

/// An item to watch, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub slug: String,
    /// Highest acceptable price, in platinum.
    pub threshold: u32,
    /// Exact rank for mods/arcanes. Also sent to the marketplace as a query filter.
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub quantity_min: Option<u32>,
    /// Only accept sellers currently in game.
    #[serde(default)]
    pub ingame_only: bool,
}

impl TrackedItem {
    pub fn new(slug: impl Into<String>, threshold: u32) -> Self {
        Self {
            slug: slug.into(),
            threshold,
            rank: None,
            quantity_min: None,
            ingame_only: false,
        }
    }

    #[must_use]
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    #[must_use]
    pub fn with_quantity_min(mut self, quantity: u32) -> Self {
        self.quantity_min = Some(quantity);
        self
    }

    #[must_use]
    pub fn ingame_only(mut self) -> Self {
        self.ingame_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerStatus {
    #[serde(rename = "ingame")]
    InGame,
    Online,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SellerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SellerStatus::InGame => "in game",
            SellerStatus::Online => "online",
            SellerStatus::Offline => "offline",
            SellerStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seller {
    pub ingame_name: String,
    pub slug: String,
    pub avatar: Option<String>,
    pub status: SellerStatus,
    pub reputation: i64,
}

impl Seller {
    pub fn new(ingame_name: impl Into<String>) -> Self {
        let ingame_name = ingame_name.into();
        Self {
            slug: ingame_name.to_lowercase(),
            ingame_name,
            avatar: None,
            status: SellerStatus::Unknown,
            reputation: 0,
        }
    }
}

/// A normalized sell order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub item_id: String,
    /// Slug of the tracked item the listing was fetched for.
    pub item_slug: String,
    pub price: u32,
    pub quantity: u32,
    pub rank: Option<u32>,
    pub seller: Seller,
}

impl Listing {
    pub fn new(
        id: impl Into<String>,
        item_slug: impl Into<String>,
        price: u32,
        seller: Seller,
    ) -> Self {
        Self {
            id: id.into(),
            item_id: String::new(),
            item_slug: item_slug.into(),
            price,
            quantity: 1,
            rank: None,
            seller,
        }
    }

    pub fn seen_key(&self) -> SeenKey {
        SeenKey::new(&self.item_slug, &self.id)
    }
}

/// Display metadata for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub icon: Option<String>,
    pub thumb: Option<String>,
}

impl ItemInfo {
    /// Used when the item endpoint is unreachable: "fang_prime_blade" -> "Fang Prime Blade".
    pub fn fallback(slug: &str) -> Self {
        let name = slug
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            id: String::new(),
            slug: slug.to_string(),
            name,
            icon: None,
            thumb: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire format (warframe.market API v2). Unknown fields are ignored.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub api_version: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Orders are kept as raw JSON so one malformed order cannot fail the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopOrders {
    #[serde(default)]
    pub sell: Vec<serde_json::Value>,
    #[serde(default)]
    pub buy: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrder {
    pub id: String,
    pub platinum: u32,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub rank: Option<u32>,
    pub user: RawUser,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub ingame_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: SellerStatus,
    #[serde(default)]
    pub reputation: i64,
}

impl RawOrder {
    pub fn into_listing(self, item_slug: &str) -> Listing {
        Listing {
            id: self.id,
            item_id: self.item_id,
            item_slug: item_slug.to_string(),
            price: self.platinum,
            quantity: self.quantity,
            rank: self.rank,
            seller: Seller {
                ingame_name: self.user.ingame_name,
                slug: self.user.slug,
                avatar: self.user.avatar,
                status: self.user.status,
                reputation: self.user.reputation,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub i18n: HashMap<String, RawItemI18n>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawItemI18n {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
}

impl RawItem {
    pub fn into_info(mut self) -> ItemInfo {
        match self.i18n.remove("en") {
            Some(en) => ItemInfo {
                id: self.id,
                slug: self.slug,
                name: en.name,
                icon: en.icon,
                thumb: en.thumb,
            },
            None => ItemInfo {
                id: self.id,
                ..ItemInfo::fallback(&self.slug)
            },
        }
    }
}
