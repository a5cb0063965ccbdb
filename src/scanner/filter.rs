use crate::api::{Listing, SellerStatus, TrackedItem};

/// True when `listing` is at or under the item's threshold and meets every override.
pub fn qualifies(item: &TrackedItem, listing: &Listing) -> bool {
    if listing.price > item.threshold {
        return false;
    }

    if let Some(rank) = item.rank {
        if listing.rank != Some(rank) {
            return false;
        }
    }

    if let Some(quantity_min) = item.quantity_min {
        if listing.quantity < quantity_min {
            return false;
        }
    }

    !item.ingame_only || listing.seller.status == SellerStatus::InGame
}
