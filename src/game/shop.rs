//! Between-round shop: fixed prices, cash-gated

use crate::ws::protocol::ShopItem;

pub const MEDKIT_PRICE: u32 = 40;
pub const ARMOR_PRICE: u32 = 75;
pub const SPEED_PRICE: u32 = 60;

pub const MAX_HP: i32 = 100;
pub const ARMOR_STEP: f32 = 0.2;
pub const MAX_ARMOR: f32 = 0.6;
pub const BASE_SPEED: f32 = 5.0;
pub const SPEED_STEP: f32 = 0.4;
pub const MAX_SPEED: f32 = BASE_SPEED + 1.6;

/// The player fields a purchase touches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buyer {
    pub hp: i32,
    pub cash: u32,
    pub armor: f32,
    pub speed: f32,
}

/// Why a purchase was refused; the message is shown as a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    #[error("The shop is closed during a wave")]
    ShopClosed,
    #[error("Not enough cash")]
    NotEnoughCash,
    #[error("Already at full health")]
    FullHealth,
    #[error("Armor is maxed out")]
    ArmorMaxed,
    #[error("Speed is maxed out")]
    SpeedMaxed,
}

pub fn price(item: ShopItem) -> u32 {
    match item {
        ShopItem::Medkit => MEDKIT_PRICE,
        ShopItem::Armor => ARMOR_PRICE,
        ShopItem::Speed => SPEED_PRICE,
    }
}

/// Apply a purchase, or explain why not. `between` is the round phase.
pub fn purchase(buyer: &mut Buyer, item: ShopItem, between: bool) -> Result<(), PurchaseError> {
    if !between {
        return Err(PurchaseError::ShopClosed);
    }

    // Useless purchases are refused before cash is checked
    match item {
        ShopItem::Medkit if buyer.hp >= MAX_HP => return Err(PurchaseError::FullHealth),
        ShopItem::Armor if buyer.armor >= MAX_ARMOR - 1e-4 => return Err(PurchaseError::ArmorMaxed),
        ShopItem::Speed if buyer.speed >= MAX_SPEED - 1e-4 => return Err(PurchaseError::SpeedMaxed),
        _ => {}
    }

    let cost = price(item);
    if buyer.cash < cost {
        return Err(PurchaseError::NotEnoughCash);
    }
    buyer.cash -= cost;

    match item {
        ShopItem::Medkit => buyer.hp = MAX_HP,
        ShopItem::Armor => buyer.armor = (buyer.armor + ARMOR_STEP).min(MAX_ARMOR),
        ShopItem::Speed => buyer.speed = (buyer.speed + SPEED_STEP).min(MAX_SPEED),
    }
    Ok(())
}
