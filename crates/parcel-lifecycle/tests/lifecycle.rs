//! End-to-end tests of the lifecycle core: transitions, assignments,
//! capacity accounting and their atomicity under failure and contention.

use std::sync::Arc;

use parcel_core::{Amount, DriverId, MerchantId, PhoneNumber, ShipmentId, TrackingNumber, WarehouseId};
use parcel_lifecycle::{
    CapacityLedger, Change, ChangeJournal, DriverPatch, DriverRoster, InMemoryDirectory,
    LifecycleError, LifecycleParts, MemoryJournal, NewDriver, NewMerchant, NewWarehouse, Registry,
    StatusTransitionEngine, TransitionRequest, WarehousePatch,
};
use parcel_state::{AuditTrail, NewShipment, ShipmentDetails, ShipmentDetailsPatch, ShipmentStatus};

use ShipmentStatus::*;

struct Harness {
    engine: StatusTransitionEngine,
    registry: Registry,
    journal: Arc<MemoryJournal>,
    merchant: MerchantId,
}

impl Harness {
    fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let ledger = Arc::new(CapacityLedger::new());
        let roster = Arc::new(DriverRoster::new());
        let journal = Arc::new(MemoryJournal::new());
        let engine = StatusTransitionEngine::new(LifecycleParts {
            lookup: directory.clone(),
            ledger: ledger.clone(),
            roster: roster.clone(),
            audit: Arc::new(AuditTrail::new()),
            journal: Some(journal.clone() as Arc<dyn ChangeJournal>),
        });
        let registry = Registry::new(
            directory,
            ledger,
            roster,
            Some(journal.clone() as Arc<dyn ChangeJournal>),
        );
        let merchant = registry
            .register_merchant(NewMerchant {
                name: "Nile Books".into(),
                phone: None,
            })
            .unwrap()
            .id;
        Self {
            engine,
            registry,
            journal,
            merchant,
        }
    }

    fn warehouse(&self, capacity: u32) -> WarehouseId {
        self.registry
            .register_warehouse(NewWarehouse {
                name: "Hub".into(),
                city: Some("Cairo".into()),
                capacity,
                is_active: None,
            })
            .unwrap()
            .profile
            .id
    }

    fn driver(&self) -> DriverId {
        self.registry
            .register_driver(NewDriver {
                name: "Karim".into(),
                phone: None,
                is_active: None,
                is_available: None,
            })
            .unwrap()
            .profile
            .id
    }

    fn new_shipment(&self) -> NewShipment {
        NewShipment {
            merchant_id: self.merchant,
            details: ShipmentDetails {
                customer_name: "Mona Adel".into(),
                customer_phone: PhoneNumber::parse("+201001234567").unwrap(),
                customer_address: "12 Nile St".into(),
                city: "Cairo".into(),
                zone: None,
                description: "Books".into(),
                weight: Some(2.0),
                dimensions: None,
                declared_value: Amount::parse("declaredValue", "300").unwrap(),
                shipping_cost: Amount::parse("shippingCost", "40").unwrap(),
                cod_amount: Amount::ZERO,
                notes: None,
            },
            tracking_number: None,
            barcode: None,
            warehouse_id: None,
            driver_id: None,
        }
    }

    fn create(&self) -> ShipmentId {
        self.engine.create(self.new_shipment()).unwrap().shipment.id
    }

    fn transition(&self, id: ShipmentId, request: TransitionRequest) -> Result<ShipmentStatus, LifecycleError> {
        self.engine
            .apply_transition(id, request)
            .map(|o| o.shipment.status)
    }

    fn load(&self, warehouse: WarehouseId) -> u32 {
        self.engine.ledger().snapshot(warehouse).unwrap().current_load
    }

    fn available(&self, driver: DriverId) -> bool {
        self.engine.roster().snapshot(driver).unwrap().is_available
    }

    /// A shipment sitting in `warehouse` with `driver` pre-assigned.
    fn stored(&self, warehouse: WarehouseId, driver: Option<DriverId>) -> ShipmentId {
        let id = self.create();
        let mut request = TransitionRequest::to(InWarehouse).with_warehouse(warehouse);
        if let Some(d) = driver {
            request = request.with_driver(d);
        }
        self.transition(id, request).unwrap();
        id
    }
}

// -- Creation ----------------------------------------------------------------

#[test]
fn create_starts_in_new_with_one_history_entry() {
    let h = Harness::new();
    let created = h.engine.create(h.new_shipment()).unwrap();
    assert_eq!(created.shipment.status, New);
    assert!(created.warnings.is_empty());
    assert_eq!(created.entry.status, New);

    let detail = h.engine.detail(created.shipment.id).unwrap();
    assert_eq!(detail.status_history.len(), 1);
    assert!(detail.shipment.tracking_number.as_str().starts_with("TRK"));
}

#[test]
fn create_rejects_unknown_merchant_and_duplicate_tracking() {
    let h = Harness::new();
    let mut new = h.new_shipment();
    new.merchant_id = MerchantId::new();
    assert!(matches!(
        h.engine.create(new),
        Err(LifecycleError::NotFound { kind: "merchant", .. })
    ));

    let mut first = h.new_shipment();
    first.tracking_number = Some(TrackingNumber::new("LEGACY-0001").unwrap());
    h.engine.create(first.clone()).unwrap();
    assert!(matches!(
        h.engine.create(first),
        Err(LifecycleError::Duplicate { field: "trackingNumber", .. })
    ));
    assert_eq!(h.engine.shipment_count(), 1);
}

#[test]
fn create_keeps_shipment_when_optional_assignment_fails() {
    let h = Harness::new();
    let w = h.warehouse(1);
    h.stored(w, None);

    let mut new = h.new_shipment();
    new.warehouse_id = Some(w);
    let created = h.engine.create(new).unwrap();
    assert_eq!(created.shipment.status, New);
    assert_eq!(created.shipment.warehouse_id, None);
    assert!(matches!(
        created.warnings.as_slice(),
        [LifecycleError::CapacityExceeded { .. }]
    ));
    assert_eq!(h.load(w), 1);
}

#[test]
fn create_with_assignments() {
    let h = Harness::new();
    let w = h.warehouse(3);
    let d = h.driver();
    let mut new = h.new_shipment();
    new.warehouse_id = Some(w);
    new.driver_id = Some(d);
    let created = h.engine.create(new).unwrap();
    assert_eq!(created.shipment.warehouse_id, Some(w));
    assert!(created.shipment.occupies_warehouse);
    assert_eq!(created.shipment.driver_id, Some(d));
    assert_eq!(h.load(w), 1);
    assert!(!h.available(d));
}

// -- Transition graph --------------------------------------------------------

#[test]
fn illegal_transitions_leave_state_untouched() {
    let h = Harness::new();
    let id = h.create();
    for target in [New, Delivered, WithDriver, DeliveryFailed, Returned, PartialReturned] {
        let err = h.transition(id, TransitionRequest::to(target)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                shipment_id: id,
                from: New,
                to: target
            }
        );
    }
    let detail = h.engine.detail(id).unwrap();
    assert_eq!(detail.shipment.status, New);
    assert_eq!(detail.status_history.len(), 1);
}

#[test]
fn unknown_shipment_is_not_found() {
    let h = Harness::new();
    let err = h
        .transition(ShipmentId::new(), TransitionRequest::to(InReceipt))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { kind: "shipment", .. }));
}

#[test]
fn delivery_frees_driver_and_is_terminal() {
    let h = Harness::new();
    let w = h.warehouse(100);
    let d = h.driver();
    let id = h.create();

    h.transition(id, TransitionRequest::to(InReceipt).with_notes("dock 2")).unwrap();
    h.transition(id, TransitionRequest::to(InWarehouse).with_warehouse(w)).unwrap();
    assert_eq!(h.load(w), 1);

    h.transition(id, TransitionRequest::to(WithDriver).with_driver(d)).unwrap();
    assert_eq!(h.load(w), 0, "unit released when the shipment leaves");
    assert!(!h.available(d));

    let history_before = h.engine.detail(id).unwrap().status_history.len();
    let outcome = h.engine.apply_transition(id, TransitionRequest::to(Delivered)).unwrap();
    assert_eq!(outcome.shipment.status, Delivered);
    assert_eq!(outcome.entry.status, Delivered);
    assert!(h.available(d));

    let detail = h.engine.detail(id).unwrap();
    assert_eq!(detail.status_history.len(), history_before + 1);
    assert_eq!(
        detail.status_history.iter().map(|e| e.status).collect::<Vec<_>>(),
        vec![New, InReceipt, InWarehouse, WithDriver, Delivered]
    );
    assert_eq!(detail.status_history[1].notes.as_deref(), Some("dock 2"));
    assert_eq!(h.engine.audit().current_status(id), Some(Delivered));

    for target in ShipmentStatus::ALL {
        assert!(matches!(
            h.transition(id, TransitionRequest::to(target)),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }
}

#[test]
fn failed_delivery_keeps_driver_until_return() {
    let h = Harness::new();
    let w = h.warehouse(10);
    let d = h.driver();
    let id = h.stored(w, Some(d));

    h.transition(id, TransitionRequest::to(WithDriver)).unwrap();
    h.transition(id, TransitionRequest::to(DeliveryFailed)).unwrap();
    assert!(!h.available(d));

    h.transition(id, TransitionRequest::to(WithDriver)).unwrap();
    h.transition(id, TransitionRequest::to(DeliveryFailed)).unwrap();
    h.transition(id, TransitionRequest::to(PartialReturned)).unwrap();
    assert!(h.available(d));
    assert_eq!(h.load(w), 0);
}

// -- Side effects and atomicity ---------------------------------------------

#[test]
fn entering_warehouse_requires_a_warehouse() {
    let h = Harness::new();
    let id = h.create();
    let err = h.transition(id, TransitionRequest::to(InWarehouse)).unwrap_err();
    assert_eq!(
        err,
        LifecycleError::AssignmentRequired {
            shipment_id: id,
            target: InWarehouse,
            missing: "warehouse"
        }
    );
}

#[test]
fn capacity_refusal_rolls_back_the_transition() {
    let h = Harness::new();
    let w = h.warehouse(1);
    h.stored(w, None);

    let id = h.create();
    let err = h
        .transition(id, TransitionRequest::to(InWarehouse).with_warehouse(w))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded { current_load: 1, capacity: 1, .. }));

    let detail = h.engine.detail(id).unwrap();
    assert_eq!(detail.shipment.status, New);
    assert_eq!(detail.shipment.warehouse_id, None);
    assert_eq!(detail.status_history.len(), 1);
    assert_eq!(h.load(w), 1);
}

#[test]
fn failed_dispatch_keeps_the_warehouse_unit() {
    let h = Harness::new();
    let w = h.warehouse(5);
    let d = h.driver();
    let busy = h.stored(w, Some(d));
    let id = h.stored(w, None);
    assert_eq!(h.load(w), 2);

    let err = h
        .transition(id, TransitionRequest::to(WithDriver).with_driver(d))
        .unwrap_err();
    assert_eq!(
        err,
        LifecycleError::DriverUnavailable {
            driver_id: d,
            held_by: Some(busy)
        }
    );
    assert_eq!(h.load(w), 2);
    assert_eq!(h.engine.get(id).unwrap().status, InWarehouse);

    let err = h.transition(id, TransitionRequest::to(WithDriver)).unwrap_err();
    assert!(matches!(err, LifecycleError::AssignmentRequired { missing: "driver", .. }));
}

#[test]
fn transition_into_second_warehouse_restores_first_on_refusal() {
    let h = Harness::new();
    let a = h.warehouse(5);
    let b = h.warehouse(1);
    h.stored(b, None);

    let id = h.create();
    h.engine.coordinator().assign_warehouse(id, a).unwrap();
    assert_eq!(h.load(a), 1);

    // Inside a transition the move is all-or-nothing.
    let err = h
        .transition(id, TransitionRequest::to(InWarehouse).with_warehouse(b))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CapacityExceeded { .. }));
    assert_eq!(h.load(a), 1);
    let s = h.engine.get(id).unwrap();
    assert_eq!(s.held_warehouse(), Some(a));
}

#[test]
fn inactive_driver_cannot_be_dispatched() {
    let h = Harness::new();
    let w = h.warehouse(5);
    let d = h.driver();
    let id = h.stored(w, Some(d));
    h.registry
        .update_driver(
            d,
            DriverPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    let err = h.transition(id, TransitionRequest::to(WithDriver)).unwrap_err();
    assert!(matches!(err, LifecycleError::Ineligible { kind: "driver", .. }));
    assert_eq!(h.load(w), 1);
}

// -- Coordinator -------------------------------------------------------------

#[test]
fn reassignment_reports_incomplete_and_keeps_release() {
    let h = Harness::new();
    let a = h.warehouse(5);
    let b = h.warehouse(1);
    h.stored(b, None);
    let id = h.stored(a, None);
    assert_eq!(h.load(a), 1);

    let err = h.engine.coordinator().reassign_warehouse(id, b).unwrap_err();
    match err {
        LifecycleError::ReassignmentIncomplete {
            shipment_id,
            released_from,
            attempted,
            cause,
        } => {
            assert_eq!((shipment_id, released_from, attempted), (id, a, b));
            assert!(matches!(*cause, LifecycleError::CapacityExceeded { .. }));
        }
        other => panic!("expected ReassignmentIncomplete, got {other:?}"),
    }
    assert_eq!(h.load(a), 0);
    assert_eq!(h.load(b), 1);
    let s = h.engine.get(id).unwrap();
    assert_eq!(s.warehouse_id, None);
    assert!(!s.occupies_warehouse);

    // Follow-up manual assignment.
    h.engine.coordinator().assign_warehouse(id, a).unwrap();
    assert_eq!(h.load(a), 1);
}

#[test]
fn reassignment_moves_the_unit() {
    let h = Harness::new();
    let a = h.warehouse(5);
    let b = h.warehouse(5);
    let id = h.stored(a, None);
    let s = h.engine.coordinator().reassign_warehouse(id, b).unwrap();
    assert_eq!(s.held_warehouse(), Some(b));
    assert_eq!((h.load(a), h.load(b)), (0, 1));

    // Same warehouse again is a no-op.
    h.engine.coordinator().assign_warehouse(id, b).unwrap();
    assert_eq!(h.load(b), 1);
}

#[test]
fn inactive_or_unknown_warehouse_rejected_without_change() {
    let h = Harness::new();
    let a = h.warehouse(5);
    let closed = h.warehouse(5);
    h.registry
        .update_warehouse(
            closed,
            WarehousePatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    let id = h.stored(a, None);

    let err = h.engine.coordinator().reassign_warehouse(id, closed).unwrap_err();
    assert!(matches!(err, LifecycleError::Ineligible { kind: "warehouse", .. }));
    let err = h
        .engine
        .coordinator()
        .reassign_warehouse(id, WarehouseId::new())
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { kind: "warehouse", .. }));
    assert_eq!(h.load(a), 1);
}

#[test]
fn warehouse_assignment_locked_after_dispatch() {
    let h = Harness::new();
    let a = h.warehouse(5);
    let b = h.warehouse(5);
    let d = h.driver();
    let id = h.stored(a, Some(d));
    h.transition(id, TransitionRequest::to(WithDriver)).unwrap();
    let err = h.engine.coordinator().assign_warehouse(id, b).unwrap_err();
    assert_eq!(
        err,
        LifecycleError::AssignmentLocked {
            shipment_id: id,
            status: WithDriver
        }
    );
}

#[test]
fn driver_assignment_is_idempotent_and_exclusive() {
    let h = Harness::new();
    let d = h.driver();
    let first = h.create();
    let second = h.create();

    h.engine.coordinator().assign_driver(first, d).unwrap();
    h.engine.coordinator().assign_driver(first, d).unwrap();
    assert!(!h.available(d));

    let err = h.engine.coordinator().assign_driver(second, d).unwrap_err();
    assert_eq!(
        err,
        LifecycleError::DriverUnavailable {
            driver_id: d,
            held_by: Some(first)
        }
    );

    let s = h.engine.coordinator().release_driver(first).unwrap();
    assert_eq!(s.driver_id, None);
    assert!(h.available(d));
    // Releasing again is a no-op.
    h.engine.coordinator().release_driver(first).unwrap();
    h.engine.coordinator().assign_driver(second, d).unwrap();
}

#[test]
fn swapping_drivers_frees_the_old_one() {
    let h = Harness::new();
    let d1 = h.driver();
    let d2 = h.driver();
    let id = h.create();
    h.engine.coordinator().assign_driver(id, d1).unwrap();
    h.engine.coordinator().assign_driver(id, d2).unwrap();
    assert!(h.available(d1));
    assert!(!h.available(d2));
}

#[test]
fn driver_release_locked_while_out_for_delivery() {
    let h = Harness::new();
    let w = h.warehouse(5);
    let d = h.driver();
    let id = h.stored(w, Some(d));
    h.transition(id, TransitionRequest::to(WithDriver)).unwrap();
    assert!(matches!(
        h.engine.coordinator().release_driver(id),
        Err(LifecycleError::AssignmentLocked { .. })
    ));
    assert!(!h.available(d));
}

// -- Edits and deletion ------------------------------------------------------

#[test]
fn delete_only_while_new_and_frees_everything() {
    let h = Harness::new();
    let w = h.warehouse(5);
    let d = h.driver();
    let mut new = h.new_shipment();
    new.warehouse_id = Some(w);
    new.driver_id = Some(d);
    let id = h.engine.create(new).unwrap().shipment.id;

    h.engine.delete(id).unwrap();
    assert_eq!(h.load(w), 0);
    assert!(h.available(d));
    assert!(matches!(h.engine.get(id), Err(LifecycleError::NotFound { .. })));
    assert!(matches!(h.engine.delete(id), Err(LifecycleError::NotFound { .. })));

    let kept = h.stored(w, None);
    assert_eq!(
        h.engine.delete(kept).unwrap_err(),
        LifecycleError::DeleteForbidden {
            shipment_id: kept,
            status: InWarehouse
        }
    );
}

#[test]
fn deleted_shipment_references_are_never_reissued() {
    let h = Harness::new();
    let mut new = h.new_shipment();
    new.tracking_number = Some(TrackingNumber::new("NB-2024-0001").unwrap());
    let deleted = h.engine.create(new).unwrap().shipment;
    h.journal.take();
    h.engine.delete(deleted.id).unwrap();

    match h.journal.take().as_slice() {
        [Change::ShipmentDeleted {
            shipment_id,
            tracking_number,
            barcode,
            ..
        }] => {
            assert_eq!(*shipment_id, deleted.id);
            assert_eq!(tracking_number, &deleted.tracking_number);
            assert_eq!(barcode, &deleted.barcode);
        }
        other => panic!("expected one deletion, got {other:?}"),
    }

    let mut again = h.new_shipment();
    again.tracking_number = Some(deleted.tracking_number.clone());
    assert!(matches!(
        h.engine.create(again).unwrap_err(),
        LifecycleError::Duplicate { field: "trackingNumber", .. }
    ));
    let mut again = h.new_shipment();
    again.barcode = Some(deleted.barcode.clone());
    assert!(matches!(
        h.engine.create(again).unwrap_err(),
        LifecycleError::Duplicate { field: "barcode", .. }
    ));
    assert_eq!(h.engine.shipment_count(), 0);
}

#[test]
fn update_details_does_not_touch_lifecycle() {
    let h = Harness::new();
    let id = h.create();
    let patch = ShipmentDetailsPatch {
        customer_address: Some("7 Tahrir Sq".into()),
        cod_amount: Some(Amount::parse("codAmount", "120.5").unwrap()),
        ..Default::default()
    };
    let s = h.engine.update_details(id, &patch).unwrap();
    assert_eq!(s.details.customer_address, "7 Tahrir Sq");
    assert_eq!(s.details.cod_amount.minor_units(), 12_050);
    assert_eq!(s.status, New);
    assert_eq!(h.engine.detail(id).unwrap().status_history.len(), 1);
}

// -- Polling & journal -------------------------------------------------------

#[test]
fn changes_since_returns_new_entries_only() {
    let h = Harness::new();
    let a = h.create();
    let cursor = h.engine.audit().head();
    let b = h.create();
    h.transition(a, TransitionRequest::to(InReceipt)).unwrap();

    let changes = h.engine.changes_since(cursor, 100);
    assert_eq!(
        changes.iter().map(|e| (e.shipment_id, e.status)).collect::<Vec<_>>(),
        vec![(b, New), (a, InReceipt)]
    );
    assert!(h.engine.changes_since(h.engine.audit().head(), 100).is_empty());
}

#[test]
fn journal_sees_touched_accounts_and_no_rejections() {
    let h = Harness::new();
    let w = h.warehouse(1);
    h.journal.take();

    let id = h.create();
    h.transition(id, TransitionRequest::to(InWarehouse).with_warehouse(w)).unwrap();
    let other = h.create();
    let _ = h.transition(other, TransitionRequest::to(InWarehouse).with_warehouse(w));

    let changes = h.journal.take();
    assert_eq!(changes.len(), 3, "two creations and one accepted transition");
    match &changes[1] {
        Change::Shipment {
            shipment,
            history,
            accounts,
            drivers,
        } => {
            assert_eq!(shipment.status, InWarehouse);
            assert_eq!(history.len(), 1);
            assert_eq!(accounts.len(), 1);
            assert_eq!(accounts[0].1.current_load, 1);
            assert!(drivers.is_empty());
        }
        other => panic!("unexpected change {other:?}"),
    }
}

// -- Concurrency -------------------------------------------------------------

#[test]
fn concurrent_placements_never_oversubscribe() {
    let h = Harness::new();
    let w = h.warehouse(3);
    let ids: Vec<ShipmentId> = (0..16).map(|_| h.create()).collect();

    let results: Vec<Result<ShipmentStatus, LifecycleError>> = std::thread::scope(|s| {
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let h = &h;
                s.spawn(move || h.transition(*id, TransitionRequest::to(InWarehouse).with_warehouse(w)))
            })
            .collect();
        handles.into_iter().map(|j| j.join().unwrap()).collect()
    });

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LifecycleError::CapacityExceeded { .. })));
    assert_eq!(h.load(w), 3);
}

#[test]
fn concurrent_dispatch_of_one_driver() {
    let h = Harness::new();
    let w = h.warehouse(10);
    let d = h.driver();
    let ids: Vec<ShipmentId> = (0..6).map(|_| h.stored(w, None)).collect();

    let ok = std::thread::scope(|s| {
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let h = &h;
                s.spawn(move || h.transition(*id, TransitionRequest::to(WithDriver).with_driver(d)).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|j| j.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(ok, 1);
    assert_eq!(h.load(w), 5);
    assert!(!h.available(d));
}

// -- Randomized invariants ---------------------------------------------------

mod invariants {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Transition {
            shipment: usize,
            target: usize,
            warehouse: Option<usize>,
            driver: Option<usize>,
        },
        Reassign { shipment: usize, warehouse: usize },
        AssignDriver { shipment: usize, driver: usize },
        ReleaseDriver { shipment: usize },
        Delete { shipment: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..4usize, 0..8usize, proptest::option::of(0..2usize), proptest::option::of(0..2usize))
                .prop_map(|(shipment, target, warehouse, driver)| Op::Transition {
                    shipment,
                    target,
                    warehouse,
                    driver,
                }),
            1 => (0..4usize, 0..2usize).prop_map(|(shipment, warehouse)| Op::Reassign { shipment, warehouse }),
            1 => (0..4usize, 0..2usize).prop_map(|(shipment, driver)| Op::AssignDriver { shipment, driver }),
            1 => (0..4usize).prop_map(|shipment| Op::ReleaseDriver { shipment }),
            1 => (0..4usize).prop_map(|shipment| Op::Delete { shipment }),
        ]
    }

    fn check(h: &Harness, warehouses: &[(WarehouseId, u32)], drivers: &[DriverId]) {
        let (shipments, _) = h.engine.list(None, 0, usize::MAX);
        for (w, capacity) in warehouses {
            let load = h.load(*w);
            let occupying = shipments.iter().filter(|s| s.held_warehouse() == Some(*w)).count();
            assert_eq!(load as usize, occupying, "load of {w} matches occupying shipments");
            assert!(load <= *capacity);
        }
        for d in drivers {
            let slot = h.engine.roster().snapshot(*d).unwrap();
            let holders: Vec<ShipmentId> = shipments
                .iter()
                .filter(|s| s.held_driver() == Some(*d))
                .map(|s| s.id)
                .collect();
            assert!(holders.len() <= 1, "driver {d} held twice");
            assert_eq!(slot.is_available, holders.is_empty());
            assert_eq!(slot.shipment_id, holders.first().copied());
        }
        for s in &shipments {
            assert_eq!(h.engine.audit().current_status(s.id), Some(s.status));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn load_and_driver_holds_stay_consistent(ops in proptest::collection::vec(op(), 1..40)) {
            let h = Harness::new();
            let warehouses = [(h.warehouse(2), 2), (h.warehouse(1), 1)];
            let drivers = [h.driver(), h.driver()];
            let ids: Vec<ShipmentId> = (0..4).map(|_| h.create()).collect();

            for op in ops {
                let _ = match op {
                    Op::Transition { shipment, target, warehouse, driver } => {
                        let mut request = TransitionRequest::to(ShipmentStatus::ALL[target]);
                        if let Some(w) = warehouse {
                            request = request.with_warehouse(warehouses[w].0);
                        }
                        if let Some(d) = driver {
                            request = request.with_driver(drivers[d]);
                        }
                        h.engine.apply_transition(ids[shipment], request).map(|_| ())
                    }
                    Op::Reassign { shipment, warehouse } => h
                        .engine
                        .coordinator()
                        .reassign_warehouse(ids[shipment], warehouses[warehouse].0)
                        .map(|_| ()),
                    Op::AssignDriver { shipment, driver } => h
                        .engine
                        .coordinator()
                        .assign_driver(ids[shipment], drivers[driver])
                        .map(|_| ()),
                    Op::ReleaseDriver { shipment } => h
                        .engine
                        .coordinator()
                        .release_driver(ids[shipment])
                        .map(|_| ()),
                    Op::Delete { shipment } => h.engine.delete(ids[shipment]).map(|_| ()),
                };
                check(&h, &warehouses, &drivers);
            }
        }
    }
}
