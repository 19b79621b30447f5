//! TTL domain - volatility classification and market hours

mod policy;

pub use policy::{
    HIGH_VOLATILITY_THRESHOLD, LOW_VOLATILITY_THRESHOLD, TtlPolicy, VolatilityMultipliers,
    is_market_hours,
};
