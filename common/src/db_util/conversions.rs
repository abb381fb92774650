//! Safe-ish conversions between rust and sql types.

use super::*;
use bigdecimal::{FromPrimitive, ToPrimitive};

pub fn i32_to_u32(i: i32) -> Result<u32> {
    u32::try_from(i).map_err(|_| anyhow!("i32 value {i} is negative and cannot be converted to u32"))
}
pub fn u32_to_i32(i: u32) -> Result<i32> {
    i32::try_from(i).map_err(|_| anyhow!("u32 value {i} exceeds i32::MAX and cannot be converted to i32"))
}

pub fn opti32_to_optu32(i: Option<i32>) -> Result<Option<u32>> {
    i.map(i32_to_u32).transpose()
}
pub fn optu32_to_opti32(i: Option<u32>) -> Result<Option<i32>> {
    i.map(u32_to_i32).transpose()
}

pub fn bigdec_to_f64(i: &BigDecimal) -> Result<f64> {
    i.to_f64()
        .ok_or_else(|| anyhow!("BigDecimal value {i} cannot be converted to f64"))
}
/// Scores are stored with one decimal place.
pub fn f64_to_bigdec(i: f64) -> Result<BigDecimal> {
    BigDecimal::from_f64(i)
        .map(|d| d.round(1))
        .ok_or_else(|| anyhow!("f64 value {i} cannot be converted to BigDecimal"))
}

pub fn serialize_role(role: UserRole) -> String {
    role.to_string()
}
pub fn deserialize_role(s: &str) -> Result<UserRole> {
    match s {
        "judge" => Ok(UserRole::Judge),
        "presenter" => Ok(UserRole::Presenter),
        "admin" => Ok(UserRole::Admin),
        _ => Err(anyhow!("Unknown user role: {s}")),
    }
}

pub fn serialize_status(status: PeriodStatus) -> String {
    status.to_string()
}
pub fn deserialize_status(s: &str) -> Result<PeriodStatus> {
    match s {
        "active" => Ok(PeriodStatus::Active),
        "closed" => Ok(PeriodStatus::Closed),
        _ => Err(anyhow!("Unknown period status: {s}")),
    }
}
