//! Billing total computation

use super::pricing::PricingService;
use super::record::{BillingData, ReportingData};
use crate::config::PricingConfig;
use crate::engine::ItemProcessor;

/// Prices a record and drops it when the total is below the threshold
///
/// Rates are read from the pricing service once, at construction, so every
/// record of a run is priced the same way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingDataProcessor {
    rates: PricingConfig,
    spending_threshold: f64,
}

impl BillingDataProcessor {
    pub fn new(pricing: &dyn PricingService, spending_threshold: f64) -> Self {
        Self {
            rates: pricing.snapshot(),
            spending_threshold,
        }
    }

    pub fn spending_threshold(&self) -> f64 {
        self.spending_threshold
    }

    pub fn billing_total(&self, data: &BillingData) -> f64 {
        data.data_usage * self.rates.data_price
            + f64::from(data.call_duration) * self.rates.call_price
            + f64::from(data.sms_count) * self.rates.sms_price
    }
}

impl ItemProcessor<BillingData, ReportingData> for BillingDataProcessor {
    fn process(&self, item: BillingData) -> Option<ReportingData> {
        let billing_total = self.billing_total(&item);

        // A total equal to the threshold is reported
        if billing_total < self.spending_threshold {
            return None;
        }

        Some(ReportingData {
            billing_data: item,
            billing_total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::billing::pricing::FixedPricing;
    use proptest::prelude::*;

    fn processor(threshold: f64) -> BillingDataProcessor {
        let pricing = FixedPricing::new(PricingConfig {
            data_price: 1.0,
            call_price: 0.5,
            sms_price: 0.25,
        });
        BillingDataProcessor::new(&pricing, threshold)
    }

    fn record(data_usage: f64, call_duration: i32, sms_count: i32) -> BillingData {
        BillingData {
            data_year: 2023,
            data_month: 1,
            account_id: 1,
            phone_number: "+1-202-555-0171".to_string(),
            data_usage,
            call_duration,
            sms_count,
        }
    }

    #[test]
    fn test_weighted_sum() {
        let total = processor(0.0).billing_total(&record(100.0, 40, 8));
        assert_eq!(total, 100.0 + 20.0 + 2.0);
    }

    #[test]
    fn test_total_equal_to_threshold_is_kept() {
        let output = processor(150.0).process(record(150.0, 0, 0)).unwrap();
        assert_eq!(output.billing_total, 150.0);
    }

    #[test]
    fn test_total_below_threshold_is_filtered() {
        assert!(processor(150.0).process(record(149.99, 0, 0)).is_none());
    }

    #[test]
    fn test_total_above_threshold_is_kept() {
        let output = processor(150.0).process(record(100.0, 100, 5)).unwrap();
        assert_eq!(output.billing_total, 151.25);
        assert_eq!(output.billing_data.call_duration, 100);
    }

    proptest! {
        #[test]
        fn prop_process_is_pure_weighted_sum(
            usage in 0.0f64..100_000.0,
            calls in 0i32..10_000,
            sms in 0i32..10_000,
            threshold in 0.0f64..5_000.0,
        ) {
            let processor = processor(threshold);
            let expected = usage * 1.0 + f64::from(calls) * 0.5 + f64::from(sms) * 0.25;

            let first = processor.process(record(usage, calls, sms));
            let second = processor.process(record(usage, calls, sms));
            prop_assert_eq!(&first, &second);

            match first {
                Some(output) => {
                    prop_assert!((output.billing_total - expected).abs() < 1e-9);
                    prop_assert!(output.billing_total >= threshold);
                },
                None => prop_assert!(expected < threshold),
            }
        }
    }
}
