//! Unit tests for the Money module
//!
//! Covers minor-unit conversion for gateway calls, checked arithmetic,
//! currency parsing and serialization.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::GBP);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_pence() {
        let m = Money::from_minor(9500, Currency::GBP);
        assert_eq!(m.amount(), dec!(95.00));
    }

    #[test]
    fn test_from_minor_handles_zero_decimal_currency() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_exact_accepts_minor_unit_precision() {
        let m = Money::exact(dec!(19.90), Currency::GBP).unwrap();
        assert_eq!(m.amount(), dec!(19.90));
        assert!(Money::exact(dec!(1.5000), Currency::EUR).is_ok());
        assert!(Money::exact(dec!(500), Currency::JPY).is_ok());
    }

    #[test]
    fn test_exact_rejects_sub_minor_amounts() {
        assert!(matches!(
            Money::exact(dec!(0.00001), Currency::GBP),
            Err(MoneyError::InvalidAmount(_))
        ));
        assert!(Money::exact(dec!(0.004), Currency::GBP).is_err());
        assert!(Money::exact(dec!(100.5), Currency::JPY).is_err());
    }

    #[test]
    fn test_zero_is_neither_positive_nor_negative() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod minor_units {
    use super::*;

    #[test]
    fn test_to_minor_for_two_decimal_currency() {
        let m = Money::new(dec!(1250.75), Currency::GBP);
        assert_eq!(m.to_minor().unwrap(), 125075);
    }

    #[test]
    fn test_to_minor_rounds_sub_penny_amounts() {
        let m = Money::new(dec!(0.0049), Currency::GBP);
        assert_eq!(m.to_minor().unwrap(), 0);

        let m = Money::new(dec!(0.005), Currency::GBP);
        assert_eq!(m.to_minor().unwrap(), 1);
    }

    #[test]
    fn test_to_minor_for_yen() {
        let m = Money::new(dec!(4200), Currency::JPY);
        assert_eq!(m.to_minor().unwrap(), 4200);
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_net_of_fee() {
        let amount = Money::new(dec!(100.00), Currency::GBP);
        let fee = Money::new(dec!(5.00), Currency::GBP);
        let net = amount.checked_sub(&fee).unwrap();
        assert_eq!(net.amount(), dec!(95.00));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::new(dec!(30.00), Currency::GBP);
        let b = Money::new(dec!(100.00), Currency::GBP);
        let result = a.checked_sub(&b).unwrap();
        assert!(result.is_negative());
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::new(dec!(100.00), Currency::GBP);
        let b = Money::new(dec!(50.00), Currency::EUR);
        assert!(matches!(a.checked_add(&b), Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = [
            Money::new(dec!(10.00), Currency::GBP),
            Money::new(dec!(10.00), Currency::USD),
        ];
        assert!(Money::sum(Currency::GBP, items.iter()).is_err());
    }

    #[test]
    fn test_comparison_within_currency() {
        let small = Money::new(dec!(40.00), Currency::GBP);
        let large = Money::new(dec!(100.00), Currency::GBP);
        assert!(small < large);
    }
}

mod currency {
    use super::*;

    #[test]
    fn test_default_is_gbp() {
        assert_eq!(Currency::default(), Currency::GBP);
    }

    #[test]
    fn test_every_currency_parses_from_its_code() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
            assert!(!currency.symbol().is_empty());
        }
    }

    #[test]
    fn test_lower_case_codes_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_money_json_roundtrip() {
        let m = Money::new(dec!(100.50), Currency::GBP);
        let json = serde_json::to_string(&m).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, deserialized);
    }

    #[test]
    fn test_currency_serializes_upper_case() {
        let json = serde_json::to_string(&Currency::EUR).unwrap();
        assert_eq!(json, "\"EUR\"");
    }
}
