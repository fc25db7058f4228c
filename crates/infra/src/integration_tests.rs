//! Integration tests for the order completion workflow.
//!
//! Tests: Order → OrderManager → Inventory unit of work → OrderStore
//!
//! Verifies:
//! - Completion is all-or-nothing across every line of an order
//! - Inventory never goes negative, also under concurrent completions
//! - Storage faults and contention leave inventory untouched

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use storefront_core::{ExpectedVersion, OrderId, ProductId, UserId};
    use storefront_inventory::InventoryItem;
    use storefront_orders::{
        CompletionStatus, FailureReason, Order, OrderStatus, ShortfallCause,
    };
    use storefront_quantity::{Metric, Quantity};

    use crate::config::CompletionConfig;
    use crate::inventory_store::{
        InMemoryInventory, InMemoryUnitOfWork, Inventory, InventoryError, UnitOfWork,
    };
    use crate::order_manager::{CompletionError, OrderManager};
    use crate::order_store::{InMemoryOrderStore, OrderStore, OrderStoreError};

    type Manager = OrderManager<InMemoryInventory, InMemoryOrderStore>;

    fn inventory(stock: &[(ProductId, i64)]) -> InMemoryInventory {
        InMemoryInventory::with_items(
            stock
                .iter()
                .map(|(id, n)| InventoryItem::new(*id, Quantity::units(*n))),
        )
        .unwrap()
    }

    fn setup(stock: &[(ProductId, i64)]) -> Manager {
        storefront_observability::init_for_tests();
        OrderManager::new(
            inventory(stock),
            InMemoryOrderStore::new(),
            CompletionConfig::default(),
        )
    }

    fn order(lines: &[(ProductId, i64)]) -> Order {
        let mut order = Order::new(OrderId::new(), UserId::new(), Utc::now());
        for (id, n) in lines {
            order.add_line(*id, Quantity::units(*n)).unwrap();
        }
        order
    }

    fn on_hand<I: Inventory>(inventory: &I, id: &ProductId) -> Quantity {
        inventory.get(id).unwrap().unwrap().quantity().clone()
    }

    #[test]
    fn sufficient_stock_completes_and_decrements() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let mut o = order(&[(p1, 5)]);
        m.add(o.clone()).unwrap();

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.status(), CompletionStatus::Successful);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(5));
        assert_eq!(o.status(), OrderStatus::Completed);
        assert_eq!(
            m.get(&o.id_typed()).unwrap().map(|o| o.status()),
            Some(OrderStatus::Completed)
        );
    }

    #[test]
    fn insufficient_stock_fails_without_mutation() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let mut o = order(&[(p1, 15)]);
        let before = o.clone();

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.status(), CompletionStatus::Failed);
        assert!(!result.is_retryable());
        assert_eq!(result.shortfalls()[0].cause, ShortfallCause::InsufficientStock);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert_eq!(o, before);
    }

    #[test]
    fn one_unsatisfiable_line_blocks_every_line() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = setup(&[(p1, 10), (p2, 3)]);
        let mut o = order(&[(p1, 5), (p2, 100)]);

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.status(), CompletionStatus::Failed);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert_eq!(on_hand(m.inventory(), &p2), Quantity::units(3));
        assert_eq!(o.status(), OrderStatus::Open);
    }

    #[test]
    fn missing_inventory_record_fails() {
        let p1 = ProductId::new();
        let p9 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let mut o = order(&[(p9, 1)]);

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.status(), CompletionStatus::Failed);
        assert_eq!(result.shortfalls()[0].cause, ShortfallCause::MissingInventory);
        assert_eq!(result.shortfalls()[0].on_hand, None);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert!(m.inventory().get(&p9).unwrap().is_none());
    }

    #[test]
    fn every_line_is_classified_after_a_missing_record() {
        let missing = ProductId::new();
        let short = ProductId::new();
        let fine = ProductId::new();
        let m = setup(&[(short, 1), (fine, 50)]);
        let mut o = order(&[(fine, 5), (missing, 1), (short, 2), (fine, 5)]);

        let result = m.complete_order(&mut o).unwrap();

        let lines: Vec<_> = result
            .shortfalls()
            .iter()
            .map(|s| (s.line_no, s.product_id, s.cause))
            .collect();
        assert_eq!(
            lines,
            vec![
                (2, missing, ShortfallCause::MissingInventory),
                (3, short, ShortfallCause::InsufficientStock),
            ]
        );
        assert_eq!(on_hand(m.inventory(), &fine), Quantity::units(50));
    }

    #[test]
    fn repeated_product_lines_take_their_sum() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let mut o = order(&[(p1, 4), (p1, 6)]);

        assert!(m.complete_order(&mut o).unwrap().is_successful());
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(0));
    }

    #[test]
    fn validation_is_read_only_and_repeatable() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = setup(&[(p1, 10), (p2, 1)]);
        let o = order(&[(p1, 5), (p2, 2)]);

        let first = m.validate(&o).unwrap();
        let second = m.validate(&o).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert_eq!(on_hand(m.inventory(), &p2), Quantity::units(1));
    }

    #[test]
    fn held_inventory_times_out_as_retryable_failure() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let m = OrderManager::new(
            inventory(&[(p1, 10)]),
            InMemoryOrderStore::new(),
            CompletionConfig::with_lock_timeout(Duration::from_millis(20)),
        );
        let mut o = order(&[(p1, 5)]);

        let held = m.inventory().begin(&[p1], Duration::ZERO).unwrap();
        let result = m.complete_order(&mut o).unwrap();
        held.rollback().unwrap();

        assert_eq!(result.failure(), Some(&FailureReason::LockTimeout));
        assert!(result.is_retryable());
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert_eq!(o.status(), OrderStatus::Open);

        // Once released, the same order goes through.
        assert!(m.complete_order(&mut o).unwrap().is_successful());
    }

    #[test]
    fn order_store_fault_rolls_back_inventory() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = OrderManager::new(
            inventory(&[(p1, 10), (p2, 10)]),
            UnavailableOrderStore,
            CompletionConfig::default(),
        );
        let mut o = order(&[(p1, 3), (p2, 4)]);

        let err = m.complete_order(&mut o).unwrap_err();

        assert!(matches!(
            err,
            CompletionError::Store(OrderStoreError::Unavailable(_))
        ));
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(10));
        assert_eq!(on_hand(m.inventory(), &p2), Quantity::units(10));
        assert_eq!(o.status(), OrderStatus::Open);
    }

    #[test]
    fn stock_taken_after_validation_is_a_conflict() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = OrderManager::new(
            StaleReads {
                inner: inventory(&[(p1, 10), (p2, 2)]),
                phantom: Quantity::units(5),
            },
            InMemoryOrderStore::new(),
            CompletionConfig::default(),
        );
        let mut o = order(&[(p1, 4), (p2, 5)]);

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.failure(), Some(&FailureReason::Conflict { product_id: p2 }));
        assert!(result.is_retryable());
        // The decrement of p1 was rolled back with the rest.
        assert_eq!(on_hand(&m.inventory().inner, &p1), Quantity::units(10));
        assert_eq!(on_hand(&m.inventory().inner, &p2), Quantity::units(2));
    }

    #[test]
    fn completing_stale_copies_twice_takes_stock_once() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let o = order(&[(p1, 3)]);
        m.add(o.clone()).unwrap();

        let mut first = o.clone();
        let mut second = o.clone();
        assert!(m.complete_order(&mut first).unwrap().is_successful());

        let err = m.complete_order(&mut second).unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Store(OrderStoreError::Concurrency(_))
        ));
        assert_eq!(second.status(), OrderStatus::Open);
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(7));
    }

    #[test]
    fn concurrent_orders_on_disjoint_products_both_complete() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = Arc::new(setup(&[(p1, 10), (p2, 10)]));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [p1, p2]
            .into_iter()
            .map(|p| {
                let m = m.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut o = order(&[(p, 7)]);
                    barrier.wait();
                    m.complete_order(&mut o).unwrap()
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap().is_successful());
        }
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(3));
        assert_eq!(on_hand(m.inventory(), &p2), Quantity::units(3));
    }

    #[test]
    fn concurrent_orders_on_shared_product_never_both_complete() {
        for _ in 0..20 {
            let p1 = ProductId::new();
            let m = Arc::new(setup(&[(p1, 10)]));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let m = m.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        let mut o = order(&[(p1, 6)]);
                        barrier.wait();
                        m.complete_order(&mut o).unwrap()
                    })
                })
                .collect();

            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| r.is_successful())
                .count();

            assert_eq!(successes, 1);
            assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(4));
        }
    }

    #[test]
    fn overlapping_product_sets_in_opposite_order_do_not_deadlock() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = Arc::new(setup(&[(p1, 100), (p2, 100)]));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [(p1, p2), (p2, p1)]
            .into_iter()
            .map(|(a, b)| {
                let m = m.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut done = 0;
                    for _ in 0..10 {
                        let mut o = order(&[(a, 1), (b, 1)]);
                        if m.complete_order(&mut o).unwrap().is_successful() {
                            done += 1;
                        }
                    }
                    done
                })
            })
            .collect();

        let done: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(100 - done));
        assert_eq!(on_hand(m.inventory(), &p2), Quantity::units(100 - done));
    }

    #[test]
    fn unstored_order_completes_and_is_stored() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let mut o = order(&[(p1, 5)]);

        let result = m.complete_order(&mut o).unwrap();

        assert!(result.is_successful());
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(5));
        assert_eq!(o.status(), OrderStatus::Completed);
        assert_eq!(m.get(&o.id_typed()).unwrap(), Some(o.clone()));
    }

    #[test]
    fn unstored_copies_of_one_order_take_stock_once() {
        let p1 = ProductId::new();
        let m = setup(&[(p1, 10)]);
        let o = order(&[(p1, 3)]);

        let mut first = o.clone();
        let mut second = o.clone();
        assert!(m.complete_order(&mut first).unwrap().is_successful());

        let err = m.complete_order(&mut second).unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Store(OrderStoreError::Concurrency(_))
        ));
        assert_eq!(on_hand(m.inventory(), &p1), Quantity::units(7));
    }

    #[test]
    fn record_removed_before_claim_fails_without_mutation() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = OrderManager::new(
            ChangedBeforeClaim {
                inner: inventory(&[(p1, 10), (p2, 10)]),
                change: move |inv: &InMemoryInventory| {
                    let _ = inv.remove(&p2, Duration::from_millis(100));
                },
            },
            InMemoryOrderStore::new(),
            CompletionConfig::default(),
        );
        let mut o = order(&[(p1, 4), (p2, 1), (p2, 2)]);

        let result = m.complete_order(&mut o).unwrap();

        assert_eq!(result.status(), CompletionStatus::Failed);
        let lines: Vec<_> = result
            .shortfalls()
            .iter()
            .map(|s| (s.line_no, s.product_id, s.cause))
            .collect();
        assert_eq!(
            lines,
            vec![
                (2, p2, ShortfallCause::MissingInventory),
                (3, p2, ShortfallCause::MissingInventory),
            ]
        );
        assert_eq!(on_hand(&m.inventory().inner, &p1), Quantity::units(10));
        assert_eq!(o.status(), OrderStatus::Open);
        assert!(!m.contains(&o.id_typed()).unwrap());
    }

    #[test]
    fn metric_changed_before_claim_rolls_back() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let m = OrderManager::new(
            ChangedBeforeClaim {
                inner: inventory(&[(p1, 10), (p2, 10)]),
                change: move |inv: &InMemoryInventory| {
                    if inv.remove(&p1, Duration::from_millis(100)).is_ok() {
                        let relabelled = Quantity::measured(dec!(10), Metric::kilogram());
                        inv.add(InventoryItem::new(p1, relabelled)).unwrap();
                    }
                },
            },
            InMemoryOrderStore::new(),
            CompletionConfig::default(),
        );
        // p2 is decremented first, then p1 fails.
        let mut o = order(&[(p2, 3), (p1, 4)]);

        let result = m.complete_order(&mut o).unwrap();

        let shortfalls = result.shortfalls();
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].line_no, 2);
        assert_eq!(shortfalls[0].cause, ShortfallCause::IncompatibleMetric);
        assert_eq!(
            shortfalls[0].on_hand,
            Some(Quantity::measured(dec!(10), Metric::kilogram()))
        );
        assert_eq!(on_hand(&m.inventory().inner, &p2), Quantity::units(10));
        assert_eq!(o.status(), OrderStatus::Open);
    }

    #[test]
    fn failed_inventory_commit_keeps_stock_and_caller_copy() {
        storefront_observability::init_for_tests();
        let p1 = ProductId::new();
        let m = OrderManager::new(
            FailingCommit {
                inner: inventory(&[(p1, 10)]),
            },
            InMemoryOrderStore::new(),
            CompletionConfig::default(),
        );
        let mut o = order(&[(p1, 4)]);

        let err = m.complete_order(&mut o).unwrap_err();

        assert!(matches!(
            err,
            CompletionError::Inventory(InventoryError::Unavailable(_))
        ));
        assert_eq!(on_hand(&m.inventory().inner, &p1), Quantity::units(10));
        assert_eq!(o.status(), OrderStatus::Open);
        // The store is written before the commit and keeps the completed order.
        assert_eq!(
            m.get(&o.id_typed()).unwrap().map(|o| o.status()),
            Some(OrderStatus::Completed)
        );
    }

    /// Order store whose writes always fail.
    struct UnavailableOrderStore;

    impl OrderStore for UnavailableOrderStore {
        fn add(&self, _order: Order) -> Result<(), OrderStoreError> {
            Err(OrderStoreError::Unavailable("store offline".to_string()))
        }

        fn get(&self, _order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
            Ok(None)
        }

        fn update(&self, _order: &Order, _expected: ExpectedVersion) -> Result<(), OrderStoreError> {
            Err(OrderStoreError::Unavailable("store offline".to_string()))
        }

        fn find_by_period(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<Order>, OrderStoreError> {
            Ok(vec![])
        }

        fn find_by_status(&self, _status: OrderStatus) -> Result<Vec<Order>, OrderStoreError> {
            Ok(vec![])
        }

        fn find_by_user(&self, _user_id: &UserId) -> Result<Vec<Order>, OrderStoreError> {
            Ok(vec![])
        }

        fn find_by_user_and_period(
            &self,
            _user_id: &UserId,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<Order>, OrderStoreError> {
            Ok(vec![])
        }
    }

    /// Inventory whose reads overstate stock by `phantom`, as if a concurrent
    /// consumer took it right after validation.
    struct StaleReads<I> {
        inner: I,
        phantom: Quantity,
    }

    impl<I: Inventory> Inventory for StaleReads<I> {
        type UnitOfWork<'a>
            = I::UnitOfWork<'a>
        where
            Self: 'a;

        fn get(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, InventoryError> {
            let Some(mut item) = self.inner.get(product_id)? else {
                return Ok(None);
            };
            item.increase_quantity(&self.phantom)?;
            Ok(Some(item))
        }

        fn add(&self, item: InventoryItem) -> Result<(), InventoryError> {
            self.inner.add(item)
        }

        fn remove(
            &self,
            product_id: &ProductId,
            timeout: Duration,
        ) -> Result<InventoryItem, InventoryError> {
            self.inner.remove(product_id, timeout)
        }

        fn begin(
            &self,
            keys: &[ProductId],
            timeout: Duration,
        ) -> Result<Self::UnitOfWork<'_>, InventoryError> {
            self.inner.begin(keys, timeout)
        }
    }

    /// Inventory that runs `change` against the ledger right before claiming,
    /// as if another writer got in between validation and apply.
    struct ChangedBeforeClaim<F> {
        inner: InMemoryInventory,
        change: F,
    }

    impl<F> Inventory for ChangedBeforeClaim<F>
    where
        F: Fn(&InMemoryInventory) + Send + Sync,
    {
        type UnitOfWork<'a>
            = InMemoryUnitOfWork<'a>
        where
            Self: 'a;

        fn get(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, InventoryError> {
            self.inner.get(product_id)
        }

        fn add(&self, item: InventoryItem) -> Result<(), InventoryError> {
            self.inner.add(item)
        }

        fn remove(
            &self,
            product_id: &ProductId,
            timeout: Duration,
        ) -> Result<InventoryItem, InventoryError> {
            self.inner.remove(product_id, timeout)
        }

        fn begin(
            &self,
            keys: &[ProductId],
            timeout: Duration,
        ) -> Result<Self::UnitOfWork<'_>, InventoryError> {
            (self.change)(&self.inner);
            self.inner.begin(keys, timeout)
        }
    }

    /// Inventory whose commits discard the writes and report a fault.
    struct FailingCommit {
        inner: InMemoryInventory,
    }

    struct FailingCommitUnit<'a>(InMemoryUnitOfWork<'a>);

    impl UnitOfWork for FailingCommitUnit<'_> {
        fn keys(&self) -> &[ProductId] {
            self.0.keys()
        }

        fn on_hand(&self, product_id: &ProductId) -> Result<Quantity, InventoryError> {
            self.0.on_hand(product_id)
        }

        fn decrease(
            &mut self,
            product_id: &ProductId,
            quantity: &Quantity,
        ) -> Result<Quantity, InventoryError> {
            self.0.decrease(product_id, quantity)
        }

        fn increase(
            &mut self,
            product_id: &ProductId,
            quantity: &Quantity,
        ) -> Result<Quantity, InventoryError> {
            self.0.increase(product_id, quantity)
        }

        fn commit(self) -> Result<(), InventoryError> {
            self.0.rollback()?;
            Err(InventoryError::Unavailable("ledger offline".to_string()))
        }

        fn rollback(self) -> Result<(), InventoryError> {
            self.0.rollback()
        }
    }

    impl Inventory for FailingCommit {
        type UnitOfWork<'a> = FailingCommitUnit<'a>;

        fn get(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, InventoryError> {
            self.inner.get(product_id)
        }

        fn add(&self, item: InventoryItem) -> Result<(), InventoryError> {
            self.inner.add(item)
        }

        fn remove(
            &self,
            product_id: &ProductId,
            timeout: Duration,
        ) -> Result<InventoryItem, InventoryError> {
            self.inner.remove(product_id, timeout)
        }

        fn begin(
            &self,
            keys: &[ProductId],
            timeout: Duration,
        ) -> Result<Self::UnitOfWork<'_>, InventoryError> {
            self.inner.begin(keys, timeout).map(FailingCommitUnit)
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn completion_is_all_or_nothing(
            stock in prop::collection::vec(0i64..20, 1..5),
            lines in prop::collection::vec((0usize..5, 1i64..10), 1..6),
        ) {
            let ids: Vec<ProductId> = (0..5).map(|_| ProductId::new()).collect();
            let stocked: Vec<(ProductId, i64)> = ids.iter().copied().zip(stock.iter().copied()).collect();
            let m = setup(&stocked);
            let mut o = order(
                &lines.iter().map(|(idx, n)| (ids[*idx], *n)).collect::<Vec<_>>(),
            );

            let result = m.complete_order(&mut o).unwrap();

            let mut demand: HashMap<ProductId, i64> = HashMap::new();
            for (idx, n) in &lines {
                *demand.entry(ids[*idx]).or_default() += n;
            }
            let satisfiable = demand.iter().all(|(id, n)| {
                stocked.iter().any(|(sid, s)| sid == id && s >= n)
            });

            prop_assert_eq!(result.is_successful(), satisfiable);
            for (id, initial) in &stocked {
                let now = on_hand(m.inventory(), id);
                prop_assert!(!now.is_negative());
                let expected = if satisfiable {
                    initial - demand.get(id).copied().unwrap_or(0)
                } else {
                    *initial
                };
                prop_assert_eq!(now, Quantity::units(expected));
            }
            let status = if satisfiable { OrderStatus::Completed } else { OrderStatus::Open };
            prop_assert_eq!(o.status(), status);
        }
    }
}
