//! Unit tests for the identifier newtypes

use core_kernel::{
    BookingId, MaintenanceRequestId, PaymentId, PropertyId, TenancyId, UserId,
};
use uuid::Uuid;

mod payment_id_tests {
    use super::*;

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = PaymentId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = PaymentId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(PaymentId::prefix(), "PAY");
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = PaymentId::new();
        let parsed: PaymentId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("PAY-not-a-uuid".parse::<PaymentId>().is_err());
    }
}

mod cross_type_tests {
    use super::*;

    #[test]
    fn test_same_uuid_in_different_types() {
        let uuid = Uuid::new_v4();
        let payer = UserId::from_uuid(uuid);
        let property = PropertyId::from_uuid(uuid);

        assert_eq!(*payer.as_uuid(), *property.as_uuid());
        assert_ne!(payer.to_string(), property.to_string());
    }

    #[test]
    fn test_id_prefixes_are_unique() {
        let mut prefixes = vec![
            PaymentId::prefix(),
            UserId::prefix(),
            PropertyId::prefix(),
            TenancyId::prefix(),
            BookingId::prefix(),
            MaintenanceRequestId::prefix(),
        ];
        let total = prefixes.len();
        prefixes.sort();
        prefixes.dedup();

        assert_eq!(total, prefixes.len(), "All identifier prefixes should be unique");
    }
}
