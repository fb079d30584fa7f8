//! Policy knobs this core owns: the default commission rate and the two
//! optional affordability caps named in §4.4. Every knob has a default,
//! so the crate is usable with zero configuration — transport and
//! persistence configuration belong to the external collaborators named
//! in the system overview, not to this crate.

use std::env;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const COMMISSION_RATE: &str = "LOB_COMMISSION_RATE";
const MAX_POSITION_SIZE_FRACTION: &str = "LOB_MAX_POSITION_SIZE_FRACTION";
const REQUIRE_NONZERO_TOTAL_VALUE: &str = "LOB_REQUIRE_NONZERO_TOTAL_VALUE";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Applied to new portfolios created by `PortfolioManager`.
    pub commission_rate: Decimal,
    /// Position-size-fraction-of-total-value affordability cap. Off by
    /// default.
    pub max_position_size_fraction: Option<Decimal>,
    /// Whether opens are rejected while total portfolio value is zero.
    /// Off by default.
    pub require_nonzero_total_value: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.001),
            max_position_size_fraction: None,
            require_nonzero_total_value: false,
        }
    }
}

impl Config {
    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Config {
        let mut config = Config::default();

        if let Ok(raw) = env::var(COMMISSION_RATE) {
            if let Ok(parsed) = raw.parse() {
                config.commission_rate = parsed;
            }
        }

        if let Ok(raw) = env::var(MAX_POSITION_SIZE_FRACTION) {
            config.max_position_size_fraction = raw.parse().ok();
        }

        if let Ok(raw) = env::var(REQUIRE_NONZERO_TOTAL_VALUE) {
            config.require_nonzero_total_value = matches!(raw.as_str(), "1" | "true" | "TRUE");
        }

        config
    }
}
