use crate::models::{Coupon, Eligibility};
use chrono::{DateTime, Utc};

/// Decides whether a user may redeem `coupon` at `now`, given how many times
/// they already used it. Pure; title and description play no part.
pub fn evaluate(coupon: &Coupon, now: DateTime<Utc>, prior_used_count: u32) -> Eligibility {
    let is_used = coupon.limit_reached(prior_used_count);
    let is_within_period = coupon.is_within_period(now);

    Eligibility {
        is_used,
        is_within_period,
        can_use: !is_used && coupon.is_active && is_within_period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn coupon(valid_from: DateTime<Utc>, valid_to: DateTime<Utc>, is_active: bool, usage_limit: u32) -> Coupon {
        Coupon {
            id: "c1".to_string(),
            title: "10% off".to_string(),
            description: None,
            image_url: None,
            valid_from,
            valid_to,
            is_active,
            usage_limit,
            created_at: valid_from,
            updated_at: valid_from,
        }
    }

    #[test]
    fn test_fresh_coupon_is_usable() {
        let t = instant();
        let c = coupon(t - Duration::days(1), t + Duration::days(1), true, 1);

        let result = evaluate(&c, t, 0);
        assert!(!result.is_used);
        assert!(result.is_within_period);
        assert!(result.can_use);
    }

    #[test]
    fn test_used_up_coupon() {
        let t = instant();
        let c = coupon(t - Duration::days(1), t + Duration::days(1), true, 1);

        let result = evaluate(&c, t, 1);
        assert!(result.is_used);
        assert!(!result.can_use);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let t = instant();
        let c = coupon(t, t + Duration::days(1), true, 0);

        assert!(evaluate(&c, c.valid_from, 0).is_within_period);
        assert!(evaluate(&c, c.valid_to, 0).is_within_period);
        assert!(!evaluate(&c, c.valid_to + Duration::seconds(1), 0).is_within_period);
        assert!(!evaluate(&c, c.valid_from - Duration::seconds(1), 0).is_within_period);
    }

    #[test]
    fn test_inactive_coupon_cannot_be_used() {
        let t = instant();
        let c = coupon(t - Duration::days(1), t + Duration::days(1), false, 1);

        let result = evaluate(&c, t, 0);
        assert!(!result.is_used);
        assert!(result.is_within_period);
        assert!(!result.can_use);
    }

    #[test]
    fn test_multi_use_coupon() {
        let t = instant();
        let c = coupon(t - Duration::days(1), t + Duration::days(1), true, 3);

        assert!(evaluate(&c, t, 2).can_use);
        assert!(evaluate(&c, t, 3).is_used);
    }

    proptest! {
        #[test]
        fn unlimited_never_exhausts(prior in any::<u32>(), offset_secs in -1_000_000i64..1_000_000) {
            let t = instant();
            let c = coupon(t - Duration::days(1), t + Duration::days(1), true, 0);
            let result = evaluate(&c, t + Duration::seconds(offset_secs), prior);
            prop_assert!(!result.is_used);
        }

        #[test]
        fn can_use_is_conjunction(
            prior in 0u32..10,
            usage_limit in 0u32..5,
            is_active in any::<bool>(),
            from_offset in -100_000i64..100_000,
            length in 1i64..200_000,
            now_offset in -300_000i64..300_000,
        ) {
            let t = instant();
            let valid_from = t + Duration::seconds(from_offset);
            let c = coupon(valid_from, valid_from + Duration::seconds(length), is_active, usage_limit);
            let result = evaluate(&c, t + Duration::seconds(now_offset), prior);

            prop_assert_eq!(result.can_use, !result.is_used && is_active && result.is_within_period);
            prop_assert_eq!(result.is_used, usage_limit > 0 && prior >= usage_limit);
        }
    }
}
