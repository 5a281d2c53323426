//! The persistence adapter contract and its SQLite rendition.
//!
//! The core calls a [`DatabaseAdapter`] with one operation per fabric
//! event; each operation is atomic. Statements and rules are merged by
//! content id so identical logic is a single node across the whole graph.
//!
//! [`SqliteAdapter`] maps the causal graph onto SQLite: one table per node
//! kind plus an `edges` table carrying the typed relationships
//! (`CONTAINS`, `FORKED_FROM`, `USED`, `INTRODUCED`, `APPLIED_RULE`,
//! `DERIVED_FACT`). Content-addressed primary keys make `INSERT OR IGNORE`
//! the MERGE of the graph schema.

use crate::{
    beliefsystem::ForkStrategy,
    error::FabricError,
    properties::{Rule, Uuid},
    simulation::SimulationRecord,
};

/// The contract between the core and a persistence backend.
///
/// Persistence failures propagate to the caller unchanged; the in-memory
/// simulation result remains valid and the write may be retried against a
/// healthy adapter.
pub trait DatabaseAdapter {
    async fn create_belief_system(
        &self,
        id: Uuid,
        name: &str,
        strategy: ForkStrategy,
        created_at: i64,
    ) -> Result<(), FabricError>;

    /// Persist a child belief system and its `FORKED_FROM` edge.
    async fn fork_belief_system(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
        name: &str,
        strategy: ForkStrategy,
        created_at: i64,
    ) -> Result<(), FabricError>;

    /// MERGE semantics on rule content: re-adding an identical rule links
    /// the existing node.
    async fn add_rule(&self, belief_system_id: Uuid, rule: &Rule) -> Result<(), FabricError>;

    /// Persist one simulation event in a single transaction: the
    /// `Simulation` node and all of its `USED`, `INTRODUCED`,
    /// `APPLIED_RULE`, and `DERIVED_FACT` relationships.
    async fn record_simulation(&self, record: &SimulationRecord) -> Result<(), FabricError>;

    async fn get_simulation_history(
        &self,
        belief_system_id: Uuid,
    ) -> Result<Vec<SimulationRecord>, FabricError>;
}

#[cfg(feature = "service")]
pub use service::{db_init, SqliteAdapter, Transaction};

#[cfg(feature = "service")]
mod service {
    use std::{path::Path, result::Result, str::FromStr};

    use futures_core::future::BoxFuture;
    use sqlx::{
        error::BoxDynError,
        migrate::{
            MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator,
        },
        sqlite::{Sqlite, SqliteConnectOptions},
        ConnectOptions, Pool, QueryBuilder,
    };

    use super::DatabaseAdapter;
    use crate::{
        beliefsystem::ForkStrategy,
        condition::Binding,
        error::FabricError,
        properties::{Canonical, Consequence, Rule, Statement, Uuid},
        simulation::{AppliedRuleRecord, SimulationRecord},
    };

    const EDGE_USED: &str = "USED";
    const EDGE_INTRODUCED: &str = "INTRODUCED";
    const EDGE_DERIVED_FACT: &str = "DERIVED_FACT";
    const EDGE_APPLIED_RULE: &str = "APPLIED_RULE";
    const EDGE_CONTAINS: &str = "CONTAINS";
    const EDGE_FORKED_FROM: &str = "FORKED_FROM";

    /// A batched write: statements are staged into one `QueryBuilder` and
    /// executed as a single multi-statement query, so a simulation event
    /// lands atomically.
    pub struct Transaction<'a> {
        qb: QueryBuilder<'a, Sqlite>,
        pub staged: usize,
    }

    impl<'a> Default for Transaction<'a> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<'a> Transaction<'a> {
        pub fn new() -> Transaction<'a> {
            Transaction {
                qb: QueryBuilder::<Sqlite>::new(""),
                staged: 0,
            }
        }

        pub async fn execute(&mut self, connection: &Pool<Sqlite>) -> Result<(), FabricError> {
            let query = self.qb.build();
            query.execute(connection).await?;
            self.qb.reset();
            self.staged = 0;
            Ok(())
        }

        pub fn stage_belief_system(
            &mut self,
            id: &Uuid,
            name: &str,
            strategy: ForkStrategy,
            created_at: i64,
        ) {
            self.qb.push(
                "INSERT OR IGNORE INTO belief_systems(id, name, strategy, created_at) ",
            );
            self.qb.push_values(
                vec![(id, name, strategy, created_at)],
                |mut b, (id, name, strategy, created_at)| {
                    b.push_bind(id.to_string())
                        .push_bind(name.to_string())
                        .push_bind(strategy.to_string())
                        .push_bind(created_at);
                },
            );
            self.qb.push("; ");
            self.staged += 1;
        }

        pub fn stage_rule(&mut self, rule: &Rule) {
            self.qb
                .push("INSERT OR IGNORE INTO rules(id, condition_json, consequences_json) ");
            self.qb.push_values(vec![rule], |mut b, rule| {
                b.push_bind(rule.id().to_string())
                    .push_bind(
                        serde_json::to_string(&rule.condition).expect("conditions serialize"),
                    )
                    .push_bind(
                        serde_json::to_string(&rule.consequences)
                            .expect("consequences serialize"),
                    );
            });
            self.qb.push("; ");
            self.staged += 1;
        }

        pub fn stage_statement(&mut self, statement: &Statement) {
            self.qb.push(
                "INSERT OR IGNORE INTO statements(id, verb, terms_json, negated, priority) ",
            );
            self.qb.push_values(vec![statement], |mut b, statement| {
                b.push_bind(statement.content_id().to_string())
                    .push_bind(statement.verb.clone())
                    .push_bind(
                        serde_json::to_string(&statement.terms).expect("terms serialize"),
                    )
                    .push_bind(statement.negated)
                    .push_bind(statement.priority);
            });
            self.qb.push("; ");
            self.staged += 1;
        }

        pub fn stage_simulation(
            &mut self,
            id: &Uuid,
            belief_system_id: &Uuid,
            timestamp: i64,
            forked_belief_id: Option<Uuid>,
        ) {
            self.qb.push(
                "INSERT OR IGNORE INTO simulations(id, belief_system_id, timestamp, forked_belief_id) ",
            );
            self.qb.push_values(
                vec![(id, belief_system_id, timestamp, forked_belief_id)],
                |mut b, (id, bs_id, timestamp, forked)| {
                    b.push_bind(id.to_string())
                        .push_bind(bs_id.to_string())
                        .push_bind(timestamp)
                        .push_bind(forked.map(|f| f.to_string()));
                },
            );
            self.qb.push("; ");
            self.staged += 1;
        }

        pub fn stage_edge(
            &mut self,
            source: &Uuid,
            sink: &Uuid,
            kind: &str,
            ord: i64,
            payload: Option<String>,
        ) {
            self.qb
                .push("INSERT OR IGNORE INTO edges(source, sink, kind, ord, payload) ");
            self.qb.push_values(
                vec![(source, sink, kind, ord, payload)],
                |mut b, (source, sink, kind, ord, payload)| {
                    b.push_bind(source.to_string())
                        .push_bind(sink.to_string())
                        .push_bind(kind.to_string())
                        .push_bind(ord)
                        .push_bind(payload);
                },
            );
            self.qb.push("; ");
            self.staged += 1;
        }
    }

    /// A migration definition.
    #[derive(Debug, Clone)]
    pub struct Migration {
        pub version: i64,
        pub description: &'static str,
        pub sql: &'static str,
        pub kind: MigrationType,
    }

    #[derive(Debug, Clone)]
    struct MigrationList(Vec<Migration>);

    impl MigrationSource<'static> for MigrationList {
        fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
            Box::pin(async move {
                let mut migrations = Vec::new();
                for migration in self.0 {
                    if matches!(migration.kind, MigrationType::ReversibleUp) {
                        migrations.push(SqlxMigration::new(
                            migration.version,
                            migration.description.into(),
                            migration.kind,
                            migration.sql.into(),
                            false,
                        ));
                    }
                }
                Ok(migrations)
            })
        }
    }

    pub async fn db_init(db_path: &Path) -> Result<Pool<Sqlite>, sqlx::Error> {
        let fqdb = format!("sqlite:{}", db_path.display());
        tracing::debug!("Initializing fabric db from file: {:?}", fqdb);
        if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
            Sqlite::create_database(&fqdb).await?;
        }
        let options = SqliteConnectOptions::from_str(&fqdb)?
            .read_only(false)
            .disable_statement_logging()
            .create_if_missing(true);
        let pool = Pool::<Sqlite>::connect_with(options).await?;

        let migrations = MigrationList(vec![Migration {
            version: 1,
            description: "create_initial_tables",
            sql: "\
            CREATE TABLE belief_systems (id TEXT PRIMARY KEY, name TEXT, strategy TEXT, created_at INTEGER); \
            CREATE TABLE rules (id TEXT PRIMARY KEY, condition_json TEXT, consequences_json TEXT); \
            CREATE TABLE statements (id TEXT PRIMARY KEY, verb TEXT, terms_json TEXT, negated INTEGER, priority INTEGER); \
            CREATE TABLE simulations (id TEXT PRIMARY KEY, belief_system_id TEXT, timestamp INTEGER, forked_belief_id TEXT); \
            CREATE TABLE edges (source TEXT, sink TEXT, kind TEXT, ord INTEGER, payload TEXT, UNIQUE(source, sink, kind));",
            kind: MigrationType::ReversibleUp,
        }]);
        let migrator = Migrator::new(migrations).await?;
        migrator.run(&pool).await?;

        Ok(pool)
    }

    /// The SQLite-backed persistence adapter.
    #[derive(Debug, Clone)]
    pub struct SqliteAdapter(pub Pool<Sqlite>);

    impl SqliteAdapter {
        pub async fn open(db_path: &Path) -> Result<SqliteAdapter, FabricError> {
            let pool = db_init(db_path).await?;
            Ok(SqliteAdapter(pool))
        }

        async fn load_statements(
            &self,
            simulation_id: &str,
            kind: &str,
        ) -> Result<Vec<Statement>, FabricError> {
            let rows = sqlx::query_as::<_, (String, String, bool, i32)>(
                "SELECT st.verb, st.terms_json, st.negated, st.priority \
                 FROM statements st JOIN edges e ON e.sink = st.id \
                 WHERE e.source = ? AND e.kind = ? ORDER BY e.ord ASC",
            )
            .bind(simulation_id)
            .bind(kind)
            .fetch_all(&self.0)
            .await?;
            rows.into_iter()
                .map(|(verb, terms_json, negated, priority)| {
                    let terms: Vec<String> = serde_json::from_str(&terms_json)?;
                    let mut statement = Statement::new(verb, terms).with_priority(priority);
                    if negated {
                        statement = statement.negate();
                    }
                    Ok(statement)
                })
                .collect()
        }

        async fn load_applied_rules(
            &self,
            simulation_id: &str,
        ) -> Result<Vec<AppliedRuleRecord>, FabricError> {
            let rows = sqlx::query_as::<_, (String, String, Option<String>)>(
                "SELECT r.condition_json, r.consequences_json, e.payload \
                 FROM rules r JOIN edges e ON e.sink = r.id \
                 WHERE e.source = ? AND e.kind = ? ORDER BY e.ord ASC",
            )
            .bind(simulation_id)
            .bind(EDGE_APPLIED_RULE)
            .fetch_all(&self.0)
            .await?;
            rows.into_iter()
                .map(|(condition_json, consequences_json, payload)| {
                    let condition = serde_json::from_str(&condition_json)?;
                    let consequences: Vec<Consequence> =
                        serde_json::from_str(&consequences_json)?;
                    let binding: Binding = match payload {
                        Some(json) => serde_json::from_str(&json)?,
                        None => Binding::new(),
                    };
                    Ok(AppliedRuleRecord {
                        rule: Rule::new(condition, consequences),
                        binding,
                    })
                })
                .collect()
        }
    }

    impl DatabaseAdapter for SqliteAdapter {
        #[tracing::instrument(skip(self))]
        async fn create_belief_system(
            &self,
            id: Uuid,
            name: &str,
            strategy: ForkStrategy,
            created_at: i64,
        ) -> Result<(), FabricError> {
            let mut tx = Transaction::new();
            tx.stage_belief_system(&id, name, strategy, created_at);
            tx.execute(&self.0).await
        }

        #[tracing::instrument(skip(self))]
        async fn fork_belief_system(
            &self,
            parent_id: Uuid,
            child_id: Uuid,
            name: &str,
            strategy: ForkStrategy,
            created_at: i64,
        ) -> Result<(), FabricError> {
            let mut tx = Transaction::new();
            tx.stage_belief_system(&child_id, name, strategy, created_at);
            tx.stage_edge(&child_id, &parent_id, EDGE_FORKED_FROM, 0, None);
            tx.execute(&self.0).await
        }

        #[tracing::instrument(skip(self, rule))]
        async fn add_rule(
            &self,
            belief_system_id: Uuid,
            rule: &Rule,
        ) -> Result<(), FabricError> {
            let mut tx = Transaction::new();
            tx.stage_rule(rule);
            tx.stage_edge(&belief_system_id, &rule.id(), EDGE_CONTAINS, 0, None);
            tx.execute(&self.0).await
        }

        #[tracing::instrument(skip(self, record), fields(simulation = %record.id))]
        async fn record_simulation(
            &self,
            record: &SimulationRecord,
        ) -> Result<(), FabricError> {
            let mut tx = Transaction::new();
            tx.stage_simulation(
                &record.id,
                &record.belief_system_id,
                record.timestamp,
                record.forked_belief_id,
            );
            tx.stage_edge(&record.id, &record.belief_system_id, EDGE_USED, 0, None);
            for (ord, statement) in record.introduced_statements.iter().enumerate() {
                tx.stage_statement(statement);
                tx.stage_edge(
                    &record.id,
                    &statement.content_id(),
                    EDGE_INTRODUCED,
                    ord as i64,
                    None,
                );
            }
            for (ord, statement) in record.derived_statements.iter().enumerate() {
                tx.stage_statement(statement);
                tx.stage_edge(
                    &record.id,
                    &statement.content_id(),
                    EDGE_DERIVED_FACT,
                    ord as i64,
                    None,
                );
            }
            for (ord, applied) in record.applied_rules.iter().enumerate() {
                tx.stage_rule(&applied.rule);
                tx.stage_edge(
                    &record.id,
                    &applied.rule_id(),
                    EDGE_APPLIED_RULE,
                    ord as i64,
                    Some(applied.binding.canonical_json()),
                );
            }
            tracing::debug!(staged = tx.staged, "executing simulation transaction");
            tx.execute(&self.0).await
        }

        #[tracing::instrument(skip(self))]
        async fn get_simulation_history(
            &self,
            belief_system_id: Uuid,
        ) -> Result<Vec<SimulationRecord>, FabricError> {
            let rows = sqlx::query_as::<_, (String, i64, Option<String>)>(
                "SELECT id, timestamp, forked_belief_id FROM simulations \
                 WHERE belief_system_id = ? ORDER BY timestamp ASC, rowid ASC",
            )
            .bind(belief_system_id.to_string())
            .fetch_all(&self.0)
            .await?;

            let mut history = Vec::with_capacity(rows.len());
            for (sim_id, timestamp, forked) in rows {
                let introduced = self.load_statements(&sim_id, EDGE_INTRODUCED).await?;
                let derived = self.load_statements(&sim_id, EDGE_DERIVED_FACT).await?;
                let applied = self.load_applied_rules(&sim_id).await?;
                history.push(SimulationRecord {
                    id: Uuid::try_from(sim_id.as_str())?,
                    belief_system_id,
                    timestamp,
                    introduced_statements: introduced,
                    derived_statements: derived,
                    applied_rules: applied,
                    forked_belief_id: match forked {
                        Some(f) => Some(Uuid::try_from(f.as_str())?),
                        None => None,
                    },
                });
            }
            Ok(history)
        }
    }
}
