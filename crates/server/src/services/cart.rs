//! Cart service.
//!
//! All cart mutations funnel through [`CartService::recompute`], which
//! re-evaluates the stored coupon against the new subtotal and runs the
//! pricing engine before the cart snapshot is returned. The derived totals
//! can therefore never go stale relative to the line items.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use clementine_core::{CartItemId, CartTotals, ProductId, VariantSelector};

use crate::db::{CartRepository, CouponRepository, ProductRepository, RepositoryError};
use crate::models::{Cart, CartOwner};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The referenced product does not exist or is inactive.
    #[error("product not found")]
    ProductNotFound,

    /// Not enough stock for the requested quantity.
    #[error("insufficient stock: only {available} available")]
    InsufficientStock { available: i32 },

    /// The referenced line item is not in this cart.
    #[error("item not found in cart")]
    ItemNotFound,

    /// Quantity must be at least 1.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// No coupon with that code.
    #[error("coupon not found")]
    CouponNotFound,

    /// The coupon exists but cannot currently be redeemed.
    #[error("coupon is invalid or expired")]
    CouponInvalid,

    /// The cart subtotal is below the coupon's minimum purchase.
    #[error("minimum purchase of {required} required")]
    MinPurchaseNotMet { required: Decimal },

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cart service over injected repositories.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    coupons: CouponRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
            coupons: CouponRepository::new(pool),
        }
    }

    /// Fetch the owner's cart, creating an empty one lazily.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.carts.get_or_create(owner).await?)
    }

    /// Add a product to the cart, merging with an existing line on
    /// product + variant match. The unit price is captured from the
    /// product at add time.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound`, `CartError::InvalidQuantity`,
    /// or `CartError::InsufficientStock`.
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
        variant: VariantSelector,
    ) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CartError::ProductNotFound)?;

        let cart = self.carts.get_or_create(owner).await?;

        // Merge with an existing line when product and variant selector
        // are structurally equal; otherwise append a new line.
        if let Some(existing) = cart.matching_item(product_id, &variant) {
            let merged = existing.quantity.saturating_add(quantity);
            if !product.has_stock_for(merged) {
                return Err(CartError::InsufficientStock {
                    available: product.stock,
                });
            }
            self.carts
                .set_item_quantity(cart.id, existing.id, merged)
                .await?;
        } else {
            if !product.has_stock_for(quantity) {
                return Err(CartError::InsufficientStock {
                    available: product.stock,
                });
            }
            self.carts
                .insert_item(cart.id, product_id, quantity, product.price, &variant)
                .await?;
        }

        self.recompute(owner).await
    }

    /// Set a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound`, `CartError::InvalidQuantity`, or
    /// `CartError::InsufficientStock`.
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let cart = self.carts.get_or_create(owner).await?;
        let item = cart.item(item_id).ok_or(CartError::ItemNotFound)?;

        let product = self
            .products
            .get(item.product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.has_stock_for(quantity) {
            return Err(CartError::InsufficientStock {
                available: product.stock,
            });
        }

        self.carts.set_item_quantity(cart.id, item_id, quantity).await?;
        self.recompute(owner).await
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the item is not in this cart.
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        item_id: CartItemId,
    ) -> Result<Cart, CartError> {
        let cart = self.carts.get_or_create(owner).await?;
        self.carts
            .remove_item(cart.id, item_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ItemNotFound,
                other => CartError::Repository(other),
            })?;

        self.recompute(owner).await
    }

    /// Empty the cart (items and coupon both).
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        let cart = self.carts.get_or_create(owner).await?;
        self.carts.clear_items(cart.id).await?;
        self.carts.set_coupon(cart.id, None).await?;
        self.recompute(owner).await
    }

    /// Apply a coupon code to the cart.
    ///
    /// Applying is provisional (no usage is consumed) and idempotent;
    /// reapplying the same code simply recomputes.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CouponNotFound`, `CartError::CouponInvalid`, or
    /// `CartError::MinPurchaseNotMet` with the required minimum.
    pub async fn apply_coupon(&self, owner: &CartOwner, code: &str) -> Result<Cart, CartError> {
        let cart = self.carts.get_or_create(owner).await?;

        let coupon = self
            .coupons
            .find_by_code(code)
            .await?
            .ok_or(CartError::CouponNotFound)?;

        let now = Utc::now();
        if !coupon.is_valid(now) {
            return Err(CartError::CouponInvalid);
        }
        if !coupon.meets_minimum(cart.totals.subtotal) {
            return Err(CartError::MinPurchaseNotMet {
                required: coupon.min_purchase,
            });
        }

        self.carts.set_coupon(cart.id, Some(&coupon.code)).await?;
        self.recompute(owner).await
    }

    /// Remove the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    pub async fn remove_coupon(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        let cart = self.carts.get_or_create(owner).await?;
        self.carts.set_coupon(cart.id, None).await?;
        self.recompute(owner).await
    }

    /// Fold a guest cart into a freshly authenticated user's cart,
    /// summing quantities on product + variant match. The guest cart is
    /// deleted afterwards.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database fails.
    pub async fn merge_guest_cart(
        &self,
        guest_key: &str,
        user_owner: &CartOwner,
    ) -> Result<Cart, CartError> {
        let guest_owner = CartOwner::Guest(guest_key.to_owned());
        let Some(guest_cart) = self.carts.find_by_owner(&guest_owner).await? else {
            return self.get_or_create(user_owner).await;
        };

        if guest_cart.is_empty() {
            self.carts.delete(guest_cart.id).await?;
            return self.get_or_create(user_owner).await;
        }

        let user_cart = self.carts.get_or_create(user_owner).await?;

        for guest_item in &guest_cart.items {
            if let Some(existing) = user_cart.matching_item(guest_item.product_id, &guest_item.variant)
            {
                self.carts
                    .set_item_quantity(
                        user_cart.id,
                        existing.id,
                        existing.quantity.saturating_add(guest_item.quantity),
                    )
                    .await?;
            } else {
                self.carts
                    .insert_item(
                        user_cart.id,
                        guest_item.product_id,
                        guest_item.quantity,
                        guest_item.unit_price,
                        &guest_item.variant,
                    )
                    .await?;
            }
        }

        self.carts.delete(guest_cart.id).await?;
        self.recompute(user_owner).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Re-derive subtotal/discount/shipping/total from the current line
    /// items and stored coupon, persist them, and return the fresh cart.
    ///
    /// A stored coupon that is no longer redeemable (expired, capped, or
    /// now under its minimum purchase) contributes zero discount but stays
    /// on the cart; order creation performs the same re-evaluation.
    async fn recompute(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let lines = cart.priced_lines();
        let subtotal = CartTotals::compute(&lines, Decimal::ZERO).subtotal;

        let discount = match &cart.coupon_code {
            Some(code) => match self.coupons.find_by_code(code).await? {
                Some(coupon) => coupon.discount_for(subtotal, Utc::now()),
                None => Decimal::ZERO,
            },
            None => Decimal::ZERO,
        };

        let totals = CartTotals::compute(&lines, discount);
        self.carts.save_totals(cart.id, &totals).await?;
        cart.totals = totals;
        cart.updated_at = Utc::now();

        Ok(cart)
    }
}
