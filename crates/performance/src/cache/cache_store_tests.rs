#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::aggregation::{FundIrr, RateOutcome};
    use crate::cache::{
        CacheKey, CacheLookup, CacheStore, CachedValue, ComputeOutcome, ComputeRole, Freshness,
    };
    use crate::cashflow::EntityKind;
    use crate::config::PerformanceConfig;

    fn store() -> CacheStore {
        CacheStore::new(PerformanceConfig::default())
    }

    fn fund_value(id: &str, rate: &str) -> CachedValue {
        CachedValue::Fund(FundIrr {
            entity_id: id.to_string(),
            entity_kind: EntityKind::Fund,
            rate: RateOutcome::Rate(rate.parse().unwrap()),
            computed_at: Utc::now(),
            input_fingerprint: "fp".to_string(),
        })
    }

    fn lead(store: &CacheStore, key: &CacheKey) -> crate::cache::ComputeGuard {
        match store.begin_compute(key) {
            ComputeRole::Leader(guard) => guard,
            ComputeRole::Joiner(_) => panic!("expected to lead"),
        }
    }

    #[tokio::test]
    async fn test_lookup_on_unknown_key_is_empty() {
        let store = store();
        assert!(matches!(
            store.lookup(&CacheKey::Fund("f-1".to_string())),
            CacheLookup::Empty
        ));
        assert_eq!(store.freshness(&CacheKey::Fund("f-1".to_string())), None);
    }

    #[tokio::test]
    async fn test_publish_makes_entry_fresh() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        let guard = lead(&store, &key);
        let freshness = guard.publish(fund_value("f-1", "0.1"));

        assert_eq!(freshness, Freshness::Fresh);
        assert_eq!(store.freshness(&key), Some(Freshness::Fresh));
        assert!(matches!(store.lookup(&key), CacheLookup::Fresh(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_second_caller_joins_in_flight_computation() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        let guard = lead(&store, &key);
        let mut rx = match store.begin_compute(&key) {
            ComputeRole::Joiner(rx) => rx,
            ComputeRole::Leader(_) => panic!("second caller must join, not lead"),
        };

        guard.publish(fund_value("f-1", "0.1"));

        let outcome = rx.wait_for(Option::is_some).await.unwrap().clone().unwrap();
        match outcome {
            ComputeOutcome::Published(CachedValue::Fund(fund), freshness) => {
                assert_eq!(fund.rate, RateOutcome::Rate(dec!(0.1)));
                assert_eq!(freshness, Freshness::Fresh);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_reverts_to_stale_keeping_prior_value() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        lead(&store, &key).publish(fund_value("f-1", "0.1"));
        store.invalidate("f-1", EntityKind::Fund);

        lead(&store, &key).fail("source down".to_string());

        match store.lookup(&key) {
            CacheLookup::Stale(Some(CachedValue::Fund(fund))) => {
                assert_eq!(fund.rate, RateOutcome::Rate(dec!(0.1)));
            }
            other => panic!("expected stale value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_without_prior_value_stays_a_miss() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        lead(&store, &key).fail("source down".to_string());

        assert!(matches!(store.lookup(&key), CacheLookup::Stale(None)));
        // The key is released; the next reader leads a fresh attempt.
        assert!(matches!(store.begin_compute(&key), ComputeRole::Leader(_)));
    }

    #[tokio::test]
    async fn test_fund_invalidation_cascades_to_portfolio_and_dashboard() {
        let store = store();
        let fund_key = CacheKey::Fund("f-1".to_string());
        let portfolio_key = CacheKey::Portfolio("p-1".to_string());
        let other_portfolio_key = CacheKey::Portfolio("p-2".to_string());

        store.record_portfolio_membership("p-1", &["f-1".to_string()]);
        store.record_portfolio_membership("p-2", &["f-2".to_string()]);

        lead(&store, &fund_key).publish(fund_value("f-1", "0.1"));
        lead(&store, &portfolio_key).publish(fund_value("p-1", "0.1"));
        lead(&store, &other_portfolio_key).publish(fund_value("p-2", "0.1"));
        lead(&store, &CacheKey::Dashboard).publish(fund_value("dash", "0.1"));

        store.invalidate("f-1", EntityKind::Fund);

        assert_eq!(store.freshness(&fund_key), Some(Freshness::Stale));
        assert_eq!(store.freshness(&portfolio_key), Some(Freshness::Stale));
        assert_eq!(store.freshness(&CacheKey::Dashboard), Some(Freshness::Stale));
        // A portfolio that does not hold the fund is untouched.
        assert_eq!(store.freshness(&other_portfolio_key), Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_membership_replacement_stops_stale_cascades() {
        let store = store();
        let portfolio_key = CacheKey::Portfolio("p-1".to_string());

        store.record_portfolio_membership("p-1", &["f-1".to_string()]);
        // The portfolio no longer holds f-1 after its latest computation.
        store.record_portfolio_membership("p-1", &["f-2".to_string()]);

        lead(&store, &portfolio_key).publish(fund_value("p-1", "0.1"));
        store.invalidate("f-1", EntityKind::Fund);

        assert_eq!(store.freshness(&portfolio_key), Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_invalidation_during_computing_supersedes_the_result() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        let guard = lead(&store, &key);
        store.invalidate("f-1", EntityKind::Fund);

        let freshness = guard.publish(fund_value("f-1", "0.1"));

        assert_eq!(freshness, Freshness::Stale);
        assert_eq!(store.freshness(&key), Some(Freshness::Stale));
        // The superseded value is still servable while the next read
        // recomputes.
        assert!(matches!(store.lookup(&key), CacheLookup::Stale(Some(_))));
    }

    #[tokio::test]
    async fn test_expired_deadline_downgrades_fresh_to_stale() {
        let config = PerformanceConfig {
            dashboard_max_age_secs: Some(0),
            ..PerformanceConfig::default()
        };
        let store = CacheStore::new(config);

        lead(&store, &CacheKey::Dashboard).publish(fund_value("dash", "0.1"));

        assert!(matches!(
            store.lookup(&CacheKey::Dashboard),
            CacheLookup::Stale(Some(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_the_key_and_notifies_joiners() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        let guard = lead(&store, &key);
        let mut rx = match store.begin_compute(&key) {
            ComputeRole::Joiner(rx) => rx,
            ComputeRole::Leader(_) => panic!("expected joiner"),
        };

        drop(guard);

        let outcome = rx.wait_for(Option::is_some).await.unwrap().clone().unwrap();
        assert!(matches!(outcome, ComputeOutcome::Failed(_)));
        assert!(matches!(store.begin_compute(&key), ComputeRole::Leader(_)));
    }

    #[tokio::test]
    async fn test_publish_replaces_the_entry_whole() {
        let store = store();
        let key = CacheKey::Fund("f-1".to_string());

        lead(&store, &key).publish(fund_value("f-1", "0.1"));
        let first = match store.lookup(&key) {
            CacheLookup::Fresh(CachedValue::Fund(fund)) => fund,
            other => panic!("unexpected {other:?}"),
        };

        store.invalidate("f-1", EntityKind::Fund);
        lead(&store, &key).publish(fund_value("f-1", "0.2"));
        let second = match store.lookup(&key) {
            CacheLookup::Fresh(CachedValue::Fund(fund)) => fund,
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(first.rate, RateOutcome::Rate(dec!(0.1)));
        assert_eq!(second.rate, RateOutcome::Rate(dec!(0.2)));
    }
}
