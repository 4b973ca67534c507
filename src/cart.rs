//! Cart

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    adjustments::BucketKey,
    pricing::{PricingError, add_minor, line_total_minor},
};

/// Errors related to cart construction or lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Index 0 names the whole-cart bucket and cannot be used by an item.
    #[error("Item index 0 is reserved for the whole cart")]
    ReservedIndex,

    /// Two items share an index.
    #[error("Item index {0} is used more than once")]
    DuplicateIndex(usize),

    /// An item's currency differs from the cart currency (index, item currency, cart currency).
    #[error("Item {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// An item was not found in the cart.
    #[error("Item {0} not found")]
    ItemNotFound(usize),
}

/// A line in the cart.
#[derive(Clone, Debug, PartialEq)]
pub struct CartItem<'a> {
    index: usize,
    product_id: String,
    qty: u32,
    unit_price: Money<'a, Currency>,
    discountable: bool,
    gift_card: bool,
}

impl<'a> CartItem<'a> {
    /// Creates a new discountable cart item.
    pub fn new(
        index: usize,
        product_id: impl Into<String>,
        qty: u32,
        unit_price: Money<'a, Currency>,
    ) -> Self {
        Self {
            index,
            product_id: product_id.into(),
            qty,
            unit_price,
            discountable: true,
            gift_card: false,
        }
    }

    /// Marks the item as (not) eligible for product-level coupons.
    #[must_use]
    pub fn with_discountable(mut self, discountable: bool) -> Self {
        self.discountable = discountable;
        self
    }

    /// Marks the item as a gift card sale.
    #[must_use]
    pub fn with_gift_card(mut self, gift_card: bool) -> Self {
        self.gift_card = gift_card;
        self
    }

    /// Returns the item's bucket index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the item's ledger bucket.
    pub fn bucket(&self) -> BucketKey {
        BucketKey::from_index(self.index)
    }

    /// Returns the product identifier.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Returns the quantity.
    pub fn qty(&self) -> u32 {
        self.qty
    }

    /// Returns the unit price.
    pub fn unit_price(&self) -> &Money<'a, Currency> {
        &self.unit_price
    }

    /// Whether product-level coupons may apply to the item. Gift card lines never are.
    pub fn is_discountable(&self) -> bool {
        self.discountable && !self.gift_card
    }

    /// Whether the line sells a gift card.
    pub fn is_gift_card(&self) -> bool {
        self.gift_card
    }

    /// Unit price × quantity.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the line total overflows.
    pub fn line_total(&self) -> Result<Money<'a, Currency>, PricingError> {
        Ok(Money::from_minor(
            line_total_minor(&self.unit_price, self.qty)?,
            self.unit_price.currency(),
        ))
    }
}

/// Cart
#[derive(Clone, Debug, PartialEq)]
pub struct Cart<'a> {
    items: Vec<CartItem<'a>>,
    currency: &'static Currency,
}

impl<'a> Cart<'a> {
    /// Create a new empty cart.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Cart {
            items: Vec::new(),
            currency,
        }
    }

    /// Create a new cart with the given items.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if an index is 0 or repeated, or an item is priced in another
    /// currency.
    pub fn with_items(
        items: impl Into<Vec<CartItem<'a>>>,
        currency: &'static Currency,
    ) -> Result<Self, CartError> {
        let mut cart = Cart::new(currency);

        items.into().into_iter().try_for_each(|item| cart.push(item))?;

        Ok(cart)
    }

    /// Add an item to the cart.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the index is 0 or already used, or the currency differs.
    pub fn push(&mut self, item: CartItem<'a>) -> Result<(), CartError> {
        if item.index == 0 {
            return Err(CartError::ReservedIndex);
        }

        if self.items.iter().any(|existing| existing.index == item.index) {
            return Err(CartError::DuplicateIndex(item.index));
        }

        let item_currency = item.unit_price.currency();

        if item_currency != self.currency {
            return Err(CartError::CurrencyMismatch(
                item.index,
                item_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        self.items.push(item);

        Ok(())
    }

    /// Remove the item with the given index.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if no item has the index.
    pub fn remove(&mut self, index: usize) -> Result<CartItem<'a>, CartError> {
        let position = self
            .items
            .iter()
            .position(|item| item.index == index)
            .ok_or(CartError::ItemNotFound(index))?;

        Ok(self.items.remove(position))
    }

    /// Calculate the subtotal of the cart.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` if the sum overflows.
    pub fn subtotal(&self) -> Result<Money<'a, Currency>, PricingError> {
        let total = self.items.iter().try_fold(0_i64, |acc, item| {
            add_minor(acc, line_total_minor(&item.unit_price, item.qty)?)
        })?;

        Ok(Money::from_minor(total, self.currency))
    }

    /// Get an item by its index.
    ///
    /// # Errors
    ///
    /// Returns a `CartError::ItemNotFound` if the item is not found.
    pub fn get_item(&self, index: usize) -> Result<&CartItem<'a>, CartError> {
        self.items
            .iter()
            .find(|item| item.index == index)
            .ok_or(CartError::ItemNotFound(index))
    }

    /// Total quantity per product identifier.
    pub fn quantities(&self) -> FxHashMap<String, u32> {
        let mut quantities = FxHashMap::default();

        for item in &self.items {
            let entry = quantities.entry(item.product_id.clone()).or_insert(0_u32);
            *entry = entry.saturating_add(item.qty);
        }

        quantities
    }

    /// Iterate over items eligible for product-level coupons.
    pub fn discountable_items(&self) -> impl Iterator<Item = &CartItem<'a>> {
        self.items.iter().filter(|item| item.is_discountable())
    }

    /// Iterate over the items in the cart.
    pub fn iter(&self) -> impl Iterator<Item = &CartItem<'a>> {
        self.items.iter()
    }

    /// Get the number of items in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the cart is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the currency of the cart.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}
