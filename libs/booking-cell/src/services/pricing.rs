// libs/booking-cell/src/services/pricing.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{BookingError, Coupon, DepositTerms, DiscountType, MembershipTier};

/// Services priced at or above this take an upfront deposit.
pub const DEPOSIT_THRESHOLD: f64 = 100.0;
/// Deposit fraction of the service price.
pub const DEPOSIT_RATE: f64 = 0.2;
/// Flat loyalty points granted for a successful referral.
pub const REFERRAL_GRANT_POINTS: i32 = 200;

pub struct PricingService {
    supabase: Arc<SupabaseClient>,
}

impl PricingService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Deposit terms for a service price: a deposit is required from
    /// 100.0 upward and is 20% of the price.
    pub fn deposit_terms(&self, service_price: f64) -> DepositTerms {
        if service_price >= DEPOSIT_THRESHOLD {
            DepositTerms {
                required: true,
                amount: Some(service_price * DEPOSIT_RATE),
            }
        } else {
            DepositTerms {
                required: false,
                amount: None,
            }
        }
    }

    /// Look up a provider's coupon by code and verify it can be applied
    /// to an order of `amount` at time `now`.
    pub async fn validate_coupon(
        &self,
        provider_id: Uuid,
        code: &str,
        amount: f64,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Coupon, BookingError> {
        debug!("Validating coupon '{}' for provider {}", code, provider_id);

        let path = format!(
            "/rest/v1/coupons?provider_id=eq.{}&code=eq.{}&limit=1",
            provider_id,
            urlencoding::encode(code)
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::InvalidCoupon("Unknown coupon code".to_string()));
        }

        let coupon: Coupon = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse coupon: {}", e)))?;

        check_coupon(&coupon, amount, now)?;

        Ok(coupon)
    }

    /// Apply a validated coupon to an amount. Percentage coupons scale
    /// the price down, fixed coupons subtract and floor at zero.
    pub fn apply_coupon(&self, coupon: &Coupon, amount: f64) -> f64 {
        let discounted = match coupon.discount_type {
            DiscountType::Percentage => amount * (1.0 - coupon.discount_value / 100.0),
            DiscountType::Fixed => amount - coupon.discount_value,
        };

        discounted.max(0.0)
    }

    /// Record one redemption against the coupon's usage counter.
    /// Read-modify-write; the small race with concurrent redemptions is
    /// accepted.
    pub async fn record_coupon_use(
        &self,
        coupon: &Coupon,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let path = format!("/rest/v1/coupons?id=eq.{}", coupon.id);
        let body = json!({
            "times_used": coupon.times_used + 1,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        info!("Coupon {} redeemed ({} uses)", coupon.code, coupon.times_used + 1);
        Ok(())
    }

    /// Membership tier for a loyalty points balance.
    pub fn tier_for_points(&self, points: i32) -> MembershipTier {
        match points {
            p if p >= 4000 => MembershipTier::Platinum,
            p if p >= 1500 => MembershipTier::Gold,
            p if p >= 500 => MembershipTier::Silver,
            _ => MembershipTier::Bronze,
        }
    }

    /// Points earned for a paid amount at the given tier, rounded down.
    pub fn points_earned(&self, amount: f64, tier: &MembershipTier) -> i32 {
        (amount * tier.points_multiplier()).floor() as i32
    }

    /// Flat grant awarded when a referred customer completes signup.
    pub fn referral_grant(&self) -> i32 {
        REFERRAL_GRANT_POINTS
    }
}

// ==============================================================================
// PRIVATE HELPER FUNCTIONS
// ==============================================================================

fn check_coupon(coupon: &Coupon, amount: f64, now: DateTime<Utc>) -> Result<(), BookingError> {
    if !coupon.is_active {
        return Err(BookingError::InvalidCoupon("Coupon is not active".to_string()));
    }

    if let Some(valid_from) = coupon.valid_from {
        if now < valid_from {
            return Err(BookingError::InvalidCoupon("Coupon is not yet valid".to_string()));
        }
    }

    if let Some(valid_until) = coupon.valid_until {
        if now > valid_until {
            return Err(BookingError::InvalidCoupon("Coupon has expired".to_string()));
        }
    }

    if let Some(min_amount) = coupon.min_amount {
        if amount < min_amount {
            return Err(BookingError::InvalidCoupon(format!(
                "Order must be at least {:.2} to use this coupon",
                min_amount
            )));
        }
    }

    if let Some(max_uses) = coupon.max_uses {
        if coupon.times_used >= max_uses {
            return Err(BookingError::InvalidCoupon(
                "Coupon usage limit reached".to_string(),
            ));
        }
    }

    Ok(())
}
