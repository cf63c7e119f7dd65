//! Test fixture for txscope integration tests
//!
//! Provides an isolated in-memory persistence unit per test, the test error
//! categories and the task kinds driven by the transaction matrix tests.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use txscope::{
    Categorized, ErrorCategory, MemoryDatabase, MemorySessionFactory, PersistenceError,
    PersistenceModule, PersistenceService, PersistenceUnit, PersistenceUnitConfig, ThreadBoundCoordinator,
    TransactionPolicy, TransactionType, UserTransactionRegistry, ANY_ERROR, RUNTIME_ERROR,
};
use uuid::Uuid;

/// Registry name of the coordinator used by JTA fixtures
pub const USER_TRANSACTION: &str = "java:comp/UserTransaction";

/// Checked-style application error category
pub static TEST_ERROR: ErrorCategory = ErrorCategory::new("TestError", &ANY_ERROR);

/// Unchecked application error category
pub static RUNTIME_TEST_ERROR: ErrorCategory =
    ErrorCategory::new("RuntimeTestError", &RUNTIME_ERROR);

#[derive(Debug, Error)]
pub enum TestError {
    #[error("test error")]
    Test,
    #[error("runtime test error")]
    RuntimeTest,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl Categorized for TestError {
    fn category(&self) -> &'static ErrorCategory {
        match self {
            TestError::Test => &TEST_ERROR,
            TestError::RuntimeTest => &RUNTIME_TEST_ERROR,
            TestError::Persistence(e) => e.category(),
        }
    }
}

/// Record written by test tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntity {
    pub id: Uuid,
    pub text: String,
}

impl TestEntity {
    pub fn new(text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
        }
    }

    pub fn key(&self) -> String {
        format!("entity:{}", self.id)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rollback_on_any() -> TransactionPolicy {
    TransactionPolicy::builder().rollback_on(&ANY_ERROR).build()
}

pub fn rollback_on_none() -> TransactionPolicy {
    TransactionPolicy::builder().rollback_on_nothing().build()
}

/// Policy and thrown error of one transactional task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    AnyThrowingNone,
    AnyThrowingRuntimeTestError,
    AnyThrowingTestError,
    NoneThrowingNone,
    NoneThrowingRuntimeTestError,
    NoneThrowingTestError,
    RuntimeTestErrorThrowingNone,
    RuntimeTestErrorThrowingRuntimeTestError,
    RuntimeTestErrorThrowingTestError,
    TestErrorThrowingNone,
    TestErrorThrowingRuntimeTestError,
    TestErrorThrowingTestError,
}

impl TaskKind {
    pub const ALL: [TaskKind; 12] = [
        TaskKind::AnyThrowingNone,
        TaskKind::AnyThrowingRuntimeTestError,
        TaskKind::AnyThrowingTestError,
        TaskKind::NoneThrowingNone,
        TaskKind::NoneThrowingRuntimeTestError,
        TaskKind::NoneThrowingTestError,
        TaskKind::RuntimeTestErrorThrowingNone,
        TaskKind::RuntimeTestErrorThrowingRuntimeTestError,
        TaskKind::RuntimeTestErrorThrowingTestError,
        TaskKind::TestErrorThrowingNone,
        TaskKind::TestErrorThrowingRuntimeTestError,
        TaskKind::TestErrorThrowingTestError,
    ];

    /// Policy the task runs under
    pub fn policy(&self) -> TransactionPolicy {
        use TaskKind::*;
        match self {
            AnyThrowingNone | AnyThrowingRuntimeTestError | AnyThrowingTestError => {
                rollback_on_any()
            }
            NoneThrowingNone | NoneThrowingRuntimeTestError | NoneThrowingTestError => {
                rollback_on_none()
            }
            RuntimeTestErrorThrowingNone
            | RuntimeTestErrorThrowingRuntimeTestError
            | RuntimeTestErrorThrowingTestError => TransactionPolicy::builder()
                .rollback_on(&RUNTIME_TEST_ERROR)
                .build(),
            TestErrorThrowingNone | TestErrorThrowingRuntimeTestError | TestErrorThrowingTestError => {
                TransactionPolicy::builder().rollback_on(&TEST_ERROR).build()
            }
        }
    }

    /// Result the task returns after doing its work
    pub fn outcome(&self) -> Result<(), TestError> {
        use TaskKind::*;
        match self {
            AnyThrowingNone
            | NoneThrowingNone
            | RuntimeTestErrorThrowingNone
            | TestErrorThrowingNone => Ok(()),
            AnyThrowingRuntimeTestError
            | NoneThrowingRuntimeTestError
            | RuntimeTestErrorThrowingRuntimeTestError
            | TestErrorThrowingRuntimeTestError => Err(TestError::RuntimeTest),
            AnyThrowingTestError
            | NoneThrowingTestError
            | RuntimeTestErrorThrowingTestError
            | TestErrorThrowingTestError => Err(TestError::Test),
        }
    }

    pub fn name(&self) -> String {
        format!("{:?}", self)
    }
}

/// Test fixture with an isolated persistence unit
pub struct TestFixture {
    module: PersistenceModule,
    unit: Arc<PersistenceUnit<MemorySessionFactory>>,
}

impl TestFixture {
    /// Fixture with a started resource-local unit
    pub fn new() -> Result<Self, PersistenceError> {
        Self::with_transaction_type(TransactionType::ResourceLocal)
    }

    /// Fixture with a started JTA unit backed by a thread-bound coordinator
    pub fn jta() -> Result<Self, PersistenceError> {
        Self::with_transaction_type(TransactionType::Jta)
    }

    fn with_transaction_type(transaction_type: TransactionType) -> Result<Self, PersistenceError> {
        init_logging();

        let registry = Arc::new(UserTransactionRegistry::new());
        registry.bind(USER_TRANSACTION, Arc::new(ThreadBoundCoordinator::new()));
        let module = PersistenceModule::new()
            .with_registry(registry)
            .with_user_transaction_name(USER_TRANSACTION);

        let config = PersistenceUnitConfig::new(format!("test_unit_{}", Uuid::new_v4().simple()))
            .with_transaction_type(transaction_type);
        let unit = module.add_unit(&config, Arc::new(MemorySessionFactory::from_config(&config)))?;
        unit.start()?;

        Ok(Self { module, unit })
    }

    pub fn module(&self) -> &PersistenceModule {
        &self.module
    }

    pub fn unit(&self) -> &Arc<PersistenceUnit<MemorySessionFactory>> {
        &self.unit
    }

    pub fn database(&self) -> Arc<MemoryDatabase> {
        self.unit
            .provider()
            .database()
            .expect("Persistence unit is not running")
    }

    /// Store a new entity in the current transaction, returning its key
    pub fn store_entity(&self, text: &str) -> Result<String, TestError> {
        let entity = TestEntity::new(text);
        let key = entity.key();
        self.unit.session()?.persist(&key, &entity)?;
        Ok(key)
    }

    pub fn is_persisted(&self, key: &str) -> bool {
        self.database().contains(key)
    }

    pub fn persisted_count(&self) -> usize {
        self.database().len()
    }

    /// Run one task in its own transaction
    pub fn run_task(&self, task: TaskKind) -> Result<(), TestError> {
        self.unit.transactional_with(&task.policy(), || {
            self.store_entity(&task.name())?;
            task.outcome()
        })
    }

    /// Run `outer`, which stores an entity, calls `inner` and then throws its own error
    pub fn run_nested(&self, outer: TaskKind, inner: TaskKind) -> Result<(), TestError> {
        self.unit.transactional_with(&outer.policy(), || {
            self.store_entity(&outer.name())?;
            self.run_task(inner)?;
            outer.outcome()
        })
    }
}
