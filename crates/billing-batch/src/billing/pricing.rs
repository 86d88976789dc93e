//! Pricing rates

use crate::config::PricingConfig;

/// Source of the per-unit rates used to price usage
pub trait PricingService: Send + Sync {
    fn data_price(&self) -> f64;

    fn call_price(&self) -> f64;

    fn sms_price(&self) -> f64;

    /// Read all three rates at once
    fn snapshot(&self) -> PricingConfig {
        PricingConfig {
            data_price: self.data_price(),
            call_price: self.call_price(),
            sms_price: self.sms_price(),
        }
    }
}

/// Rates fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedPricing {
    rates: PricingConfig,
}

impl FixedPricing {
    pub fn new(rates: PricingConfig) -> Self {
        Self { rates }
    }
}

impl From<PricingConfig> for FixedPricing {
    fn from(rates: PricingConfig) -> Self {
        Self::new(rates)
    }
}

impl PricingService for FixedPricing {
    fn data_price(&self) -> f64 {
        self.rates.data_price
    }

    fn call_price(&self) -> f64 {
        self.rates.call_price
    }

    fn sms_price(&self) -> f64 {
        self.rates.sms_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_pricing_snapshot() {
        let rates = PricingConfig {
            data_price: 1.0,
            call_price: 0.5,
            sms_price: 0.25,
        };
        let pricing = FixedPricing::from(rates);

        assert_eq!(pricing.call_price(), 0.5);
        assert_eq!(pricing.snapshot(), rates);
    }
}
