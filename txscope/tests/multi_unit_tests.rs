//! Multiple persistence units
//!
//! Local units keep independent transactions; JTA units share one global
//! transaction per thread. The request filter drives every unit together.

#[path = "testutils/mod.rs"]
mod testutils;

use std::sync::Arc;
use testutils::test_fixture::{init_logging, rollback_on_any, TestError, USER_TRANSACTION};
use txscope::{
    MemorySessionFactory, PersistenceConfig, PersistenceError, PersistenceModule,
    PersistenceService, PersistenceUnit, ThreadBoundCoordinator, TransactionStatus,
    UnitOfWork, UserTransaction, UserTransactionRegistry,
};

type MemoryUnit = Arc<PersistenceUnit<MemorySessionFactory>>;

const CONFIG: &str = r#"{
    "units": [
        { "name": "orders", "transaction_type": "JTA", "properties": { "schema": "sales" } },
        { "name": "audit", "transaction_type": "JTA" }
    ],
    "user_transaction_name": "java:comp/UserTransaction"
}"#;

struct MultiUnitFixture {
    module: PersistenceModule,
    coordinator: Arc<ThreadBoundCoordinator>,
    orders: MemoryUnit,
    audit: MemoryUnit,
}

impl MultiUnitFixture {
    fn new(config: &str) -> Result<Self, PersistenceError> {
        init_logging();
        let config = PersistenceConfig::from_json_str(config)?;

        let coordinator = Arc::new(ThreadBoundCoordinator::new());
        let registry = Arc::new(UserTransactionRegistry::new());
        registry.bind(USER_TRANSACTION, coordinator.clone());

        let module = PersistenceModule::from_config(&config, registry);
        let mut units = Vec::new();
        for unit_config in &config.units {
            units.push(module.add_unit(
                unit_config,
                Arc::new(MemorySessionFactory::from_config(unit_config)),
            )?);
        }
        module.aggregate().start()?;

        let audit = units.pop().ok_or_else(|| {
            PersistenceError::Configuration("missing audit unit".to_string())
        })?;
        let orders = units.pop().ok_or_else(|| {
            PersistenceError::Configuration("missing orders unit".to_string())
        })?;
        Ok(Self {
            module,
            coordinator,
            orders,
            audit,
        })
    }

    fn jta() -> Self {
        Self::new(CONFIG).expect("Failed to create multi-unit fixture")
    }

    fn local() -> Self {
        Self::new(&CONFIG.replace("\"JTA\"", "\"RESOURCE_LOCAL\""))
            .expect("Failed to create multi-unit fixture")
    }

    fn committed(unit: &MemoryUnit, key: &str) -> bool {
        unit.provider()
            .database()
            .map(|db| db.contains(key))
            .unwrap_or(false)
    }

    /// Place an order on the orders unit with a nested audit entry on the audit unit
    fn place_order(&self, audit_result: Result<(), TestError>) -> Result<(), TestError> {
        self.orders.transactional_with(&rollback_on_any(), || {
            self.orders.session()?.persist("order", &"widget")?;
            self.audit.transactional_with(&rollback_on_any(), || {
                self.audit.session()?.persist("entry", &"order placed")?;
                audit_result
            })
        })
    }
}

#[test]
fn test_global_transaction_commits_all_units() {
    let fixture = MultiUnitFixture::jta();

    fixture.place_order(Ok(())).expect("Transaction failed");

    assert!(MultiUnitFixture::committed(&fixture.orders, "order"));
    assert!(MultiUnitFixture::committed(&fixture.audit, "entry"));
    assert_eq!(fixture.coordinator.status(), TransactionStatus::NoTransaction);
    assert!(!fixture.orders.unit_of_work().is_active());
    assert!(!fixture.audit.unit_of_work().is_active());
}

#[test]
fn test_global_transaction_rolls_back_all_units() {
    let fixture = MultiUnitFixture::jta();

    let result = fixture.place_order(Err(TestError::Test));

    assert!(matches!(result, Err(TestError::Test)));
    assert!(!MultiUnitFixture::committed(&fixture.orders, "order"));
    assert!(!MultiUnitFixture::committed(&fixture.audit, "entry"));
    assert_eq!(fixture.coordinator.status(), TransactionStatus::NoTransaction);
}

#[test]
fn test_inner_unit_is_enlisted_in_global_transaction() {
    let fixture = MultiUnitFixture::jta();

    fixture
        .orders
        .transactional_with::<_, TestError, _>(&rollback_on_any(), || {
            assert_eq!(fixture.coordinator.enlisted_sessions(), 1);
            let outer_id = fixture.coordinator.current_transaction_id();

            fixture
                .audit
                .transactional_with::<_, TestError, _>(&rollback_on_any(), || {
                    assert_eq!(fixture.coordinator.enlisted_sessions(), 2);
                    assert_eq!(fixture.coordinator.current_transaction_id(), outer_id);

                    // Same session again: enlisting is idempotent
                    fixture
                        .audit
                        .transactional_with::<_, TestError, _>(&rollback_on_any(), || Ok(()))?;
                    assert_eq!(fixture.coordinator.enlisted_sessions(), 2);
                    Ok(())
                })?;

            // A later audit call opens a fresh session, which joins as well
            fixture
                .audit
                .transactional_with::<_, TestError, _>(&rollback_on_any(), || Ok(()))?;
            assert_eq!(fixture.coordinator.enlisted_sessions(), 3);
            Ok(())
        })
        .expect("Transaction failed");
}

#[test]
fn test_local_units_complete_independently() {
    let fixture = MultiUnitFixture::local();

    let result = fixture.place_order(Err(TestError::Test));

    // The audit unit rolled back its own transaction; orders saw the error and rolled back too
    assert!(matches!(result, Err(TestError::Test)));
    assert!(!MultiUnitFixture::committed(&fixture.audit, "entry"));
    assert!(!MultiUnitFixture::committed(&fixture.orders, "order"));

    // An error absorbed by the orders task leaves its own transaction untouched
    fixture
        .orders
        .transactional_with::<_, TestError, _>(&rollback_on_any(), || {
            fixture.orders.session()?.persist("order", &"widget")?;
            let audit = fixture.audit.transactional_with(&rollback_on_any(), || {
                fixture.audit.session()?.persist("entry", &"order placed")?;
                Err::<(), _>(TestError::Test)
            });
            assert!(audit.is_err());
            Ok(())
        })
        .expect("Transaction failed");

    assert!(MultiUnitFixture::committed(&fixture.orders, "order"));
    assert!(!MultiUnitFixture::committed(&fixture.audit, "entry"));
}

#[test]
fn test_filter_scopes_sessions_to_request() {
    let fixture = MultiUnitFixture::local();
    let filter = fixture.module.filter().expect("Failed to create filter");

    filter
        .handle::<_, TestError, _>(|| {
            assert!(fixture.module.aggregate().is_active());
            let session = fixture.orders.session()?;

            for key in ["first", "second"] {
                fixture
                    .orders
                    .transactional_with::<_, TestError, _>(&rollback_on_any(), || {
                        assert!(Arc::ptr_eq(&session, &fixture.orders.session()?));
                        fixture.orders.session()?.persist(key, &key)?;
                        Ok(())
                    })?;
            }

            // Each transaction committed while the unit of work stays open
            assert!(fixture.orders.unit_of_work().is_active());
            assert!(MultiUnitFixture::committed(&fixture.orders, "first"));
            Ok(())
        })
        .expect("Request failed");

    assert!(!fixture.module.aggregate().is_active());
    assert_eq!(fixture.orders.provider().open_sessions(), 0);
    assert_eq!(fixture.audit.provider().open_sessions(), 0);
    assert!(MultiUnitFixture::committed(&fixture.orders, "second"));
}

#[test]
fn test_filter_lifecycle() {
    let fixture = MultiUnitFixture::local();
    let filter = fixture.module.filter().expect("Failed to create filter");

    // Units were started by the fixture
    assert!(matches!(
        filter.init(),
        Err(PersistenceError::FanOut { completed: 0, .. })
    ));

    filter.destroy().expect("Failed to stop units");
    assert!(!fixture.module.aggregate().is_running());

    filter.init().expect("Failed to start units");
    assert!(fixture.orders.is_running() && fixture.audit.is_running());

    let result: Result<(), TestError> = filter.handle(|| Err(TestError::RuntimeTest));
    assert!(matches!(result, Err(TestError::RuntimeTest)));
    assert!(!fixture.module.aggregate().is_active());
}

#[test]
fn test_sessions_inherit_unit_properties() {
    let fixture = MultiUnitFixture::local();

    fixture
        .orders
        .transactional_with::<_, TestError, _>(&rollback_on_any(), || {
            assert_eq!(fixture.orders.session()?.property("schema"), Some("sales"));
            assert_eq!(fixture.audit.provider().properties().len(), 0);
            Ok(())
        })
        .expect("Transaction failed");
}
