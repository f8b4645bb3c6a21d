//! Input validation helpers
//!
//! Every intent is checked here before anything is published or sent to the
//! store. A failure means no optimistic state and no remote call.

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{
    MemberCreate, MemberUpdate, PaymentCreate, PaymentUpdate, PlanCreate, PlanUpdate,
    ProfileUpdate,
};

// ── Text length limits ──────────────────────────────────────────────

/// Member, plan and gym names
pub const MAX_NAME_LEN: usize = 200;

/// Phone numbers, payment methods
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Single plan feature line
pub const MAX_FEATURE_LEN: usize = 200;

/// Longest plan a gym can sell, in months
pub const MAX_PLAN_MONTHS: u32 = 120;

// ── Generic helpers ─────────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::required(field));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate that an optional string, if present, is non-empty and within the length limit.
pub fn validate_optional_text(value: &Option<String>, field: &str, max_len: usize) -> AppResult<()> {
    match value {
        Some(v) => validate_required_text(v, field, max_len),
        None => Ok(()),
    }
}

fn validate_months(months: u32, field: &str) -> AppResult<()> {
    if months == 0 || months > MAX_PLAN_MONTHS {
        return Err(AppError::with_message(
            ErrorCode::PlanDurationInvalid,
            format!("{field} must be between 1 and {MAX_PLAN_MONTHS} months"),
        )
        .with_detail("field", field));
    }
    Ok(())
}

fn validate_amount(amount: Decimal, field: &str) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::with_message(
            ErrorCode::PaymentAmountInvalid,
            format!("{field} must be greater than zero"),
        )
        .with_detail("field", field));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            "price must not be negative",
        )
        .with_detail("field", "price"));
    }
    Ok(())
}

// ── Per-intent validation ───────────────────────────────────────────

pub fn validate_member_create(data: &MemberCreate) -> AppResult<()> {
    validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
    validate_required_text(&data.email, "email", MAX_EMAIL_LEN)?;
    validate_required_text(&data.phone, "phone", MAX_SHORT_TEXT_LEN)?;
    validate_months(data.plan_duration, "plan_duration")?;
    if let (Some(join), Some(expiry)) = (data.joining_date, data.expiry_date)
        && expiry < join
    {
        return Err(AppError::new(ErrorCode::MemberExpiryBeforeJoin));
    }
    Ok(())
}

pub fn validate_member_update(data: &MemberUpdate) -> AppResult<()> {
    if data.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }
    validate_optional_text(&data.name, "name", MAX_NAME_LEN)?;
    validate_optional_text(&data.email, "email", MAX_EMAIL_LEN)?;
    validate_optional_text(&data.phone, "phone", MAX_SHORT_TEXT_LEN)?;
    if let Some(months) = data.plan_duration {
        validate_months(months, "plan_duration")?;
    }
    if let (Some(join), Some(expiry)) = (data.joining_date, data.expiry_date)
        && expiry < join
    {
        return Err(AppError::new(ErrorCode::MemberExpiryBeforeJoin));
    }
    Ok(())
}

pub fn validate_payment_create(data: &PaymentCreate) -> AppResult<()> {
    validate_required_text(&data.member_id, "member_id", MAX_NAME_LEN)?;
    validate_required_text(&data.payment_method, "payment_method", MAX_SHORT_TEXT_LEN)?;
    validate_amount(data.amount, "amount")
}

pub fn validate_payment_update(data: &PaymentUpdate) -> AppResult<()> {
    if data.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }
    validate_optional_text(&data.member_id, "member_id", MAX_NAME_LEN)?;
    validate_optional_text(&data.payment_method, "payment_method", MAX_SHORT_TEXT_LEN)?;
    if let Some(amount) = data.amount {
        validate_amount(amount, "amount")?;
    }
    Ok(())
}

fn validate_features(features: &[String]) -> AppResult<()> {
    for feature in features {
        validate_required_text(feature, "features", MAX_FEATURE_LEN)?;
    }
    Ok(())
}

pub fn validate_plan_create(data: &PlanCreate) -> AppResult<()> {
    validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
    validate_months(data.duration, "duration")?;
    validate_price(data.price)?;
    validate_features(&data.features)
}

pub fn validate_plan_update(data: &PlanUpdate) -> AppResult<()> {
    if data.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }
    validate_optional_text(&data.name, "name", MAX_NAME_LEN)?;
    if let Some(duration) = data.duration {
        validate_months(duration, "duration")?;
    }
    if let Some(price) = data.price {
        validate_price(price)?;
    }
    if let Some(features) = &data.features {
        validate_features(features)?;
    }
    Ok(())
}

pub fn validate_profile_update(data: &ProfileUpdate) -> AppResult<()> {
    if *data == ProfileUpdate::default() {
        return Err(AppError::validation("Nothing to update"));
    }
    validate_optional_text(&data.name, "name", MAX_NAME_LEN)?;
    validate_optional_text(&data.email, "email", MAX_EMAIL_LEN)?;
    validate_optional_text(&data.gym_name, "gym_name", MAX_NAME_LEN)?;
    if let Some(phone) = &data.phone
        && phone.len() > MAX_SHORT_TEXT_LEN
    {
        return Err(AppError::validation("phone is too long").with_detail("field", "phone"));
    }
    Ok(())
}
