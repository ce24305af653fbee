//! PostgreSQL adapter for the gate store.
//!
//! Guarded writes run in a single transaction:
//! - creation takes a per-player advisory lock, so the duplicate and
//!   predecessor checks cannot go stale before the insert; the
//!   `(player_id, gate_number)` unique constraint backs this up
//! - lifecycle transitions lock the gate row `FOR UPDATE`
//! - checklist writes lock the parent gate row `FOR SHARE`, which conflicts
//!   with a concurrent completion
//!
//! Lock order is always gate row, then item rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_types::{
    ChecklistItem, ChecklistItemId, ChecklistToggle, Gate, GateFilter, GateId, GateNumber,
    GatePatch, GateStatus, GateTransition, PageRequest, PlayerId, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, warn};

use crate::traits::{ChecklistRepository, GateRepository};
use crate::{Missing, Precondition, StoreError, StoreResult};

const GATE_COLUMNS: &str = "id, player_id, gate_number, status, started_at, completed_at, \
     approved_by, approver_role, notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, gate_id, item, is_mandatory, is_completed, assigned_to, \
     completed_at, completed_by, evidence_url, notes, sort_order, created_at";

/// PostgreSQL-backed gate store.
#[derive(Clone)]
pub struct PostgresGateStore {
    pool: PgPool,
}

impl PostgresGateStore {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StoreResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS gates (
                id TEXT PRIMARY KEY,
                player_id TEXT NOT NULL,
                gate_number SMALLINT NOT NULL CHECK (gate_number BETWEEN 0 AND 3),
                status TEXT NOT NULL CHECK (status IN ('Pending', 'InProgress', 'Completed')),
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                approved_by TEXT,
                approver_role VARCHAR(100),
                notes TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (player_id, gate_number)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gate_checklists (
                id TEXT PRIMARY KEY,
                gate_id TEXT NOT NULL REFERENCES gates(id) ON DELETE CASCADE,
                item VARCHAR(500) NOT NULL,
                is_mandatory BOOLEAN NOT NULL DEFAULT TRUE,
                is_completed BOOLEAN NOT NULL DEFAULT FALSE,
                assigned_to TEXT,
                completed_at TIMESTAMPTZ,
                completed_by TEXT,
                evidence_url TEXT,
                notes TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS gate_checklists_gate_order_idx
                ON gate_checklists (gate_id, sort_order, created_at)
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("schema init failed: {e}")))?;
        }
        debug!("gate schema initialized");
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl GateRepository for PostgresGateStore {
    async fn create_gate(&self, gate: Gate, checklist: Vec<ChecklistItem>) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(gate.player_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let existing = sqlx::query("SELECT id FROM gates WHERE player_id = $1 AND gate_number = $2")
            .bind(gate.player_id.as_str())
            .bind(gate_number_to_i16(gate.gate_number))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if existing.is_some() {
            return Err(StoreError::DuplicateGate {
                player_id: gate.player_id,
                gate_number: gate.gate_number,
            });
        }

        if let Some(previous) = gate.gate_number.previous() {
            let status: Option<String> = sqlx::query_scalar(
                "SELECT status FROM gates WHERE player_id = $1 AND gate_number = $2 FOR SHARE",
            )
            .bind(gate.player_id.as_str())
            .bind(gate_number_to_i16(previous))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            if status.as_deref() != Some(GateStatus::Completed.as_str()) {
                return Err(StoreError::Precondition(
                    Precondition::PredecessorIncomplete {
                        player_id: gate.player_id,
                        gate_number: gate.gate_number,
                    },
                ));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO gates
                (id, player_id, gate_number, status, started_at, completed_at,
                 approved_by, approver_role, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(gate.id.as_str())
        .bind(gate.player_id.as_str())
        .bind(gate_number_to_i16(gate.gate_number))
        .bind(gate.status.as_str())
        .bind(gate.started_at)
        .bind(gate.completed_at)
        .bind(gate.approved_by.as_ref().map(UserId::as_str))
        .bind(gate.approver_role.as_deref())
        .bind(gate.notes.as_deref())
        .bind(gate.created_at)
        .bind(gate.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error(e) {
            StoreError::Conflict(_) => StoreError::DuplicateGate {
                player_id: gate.player_id.clone(),
                gate_number: gate.gate_number,
            },
            other => other,
        })?;

        for item in &checklist {
            if item.gate_id != gate.id {
                return Err(StoreError::InvalidInput(format!(
                    "checklist item {} does not belong to gate {}",
                    item.id, gate.id
                )));
            }
            insert_item(&mut tx, item).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_gate(&self, gate_id: &GateId) -> StoreResult<Option<Gate>> {
        let sql = format!("SELECT {GATE_COLUMNS} FROM gates WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(gate_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(gate_row_to_record).transpose()
    }

    async fn find_gate(
        &self,
        player_id: &PlayerId,
        gate_number: GateNumber,
    ) -> StoreResult<Option<Gate>> {
        let sql = format!("SELECT {GATE_COLUMNS} FROM gates WHERE player_id = $1 AND gate_number = $2");
        let row = sqlx::query(&sql)
            .bind(player_id.as_str())
            .bind(gate_number_to_i16(gate_number))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(gate_row_to_record).transpose()
    }

    async fn list_player_gates(&self, player_id: &PlayerId) -> StoreResult<Vec<Gate>> {
        let sql = format!(
            "SELECT {GATE_COLUMNS} FROM gates WHERE player_id = $1 ORDER BY gate_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(player_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(gate_row_to_record).collect()
    }

    async fn query_gates(
        &self,
        filter: &GateFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Gate>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM gates");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let direction = page.direction.as_sql();
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {GATE_COLUMNS} FROM gates"));
        push_filter(&mut select, filter);
        select.push(format!(
            " ORDER BY {} {direction}, created_at {direction}, id {direction}",
            page.sort.column()
        ));
        select.push(" LIMIT ").push_bind(i64::from(page.limit));
        select.push(" OFFSET ").push_bind(to_i64(page.offset())?);

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let gates = rows
            .iter()
            .map(gate_row_to_record)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((gates, u64::try_from(total).unwrap_or_default()))
    }

    async fn transition_gate(
        &self,
        gate_id: &GateId,
        transition: &GateTransition,
    ) -> StoreResult<Gate> {
        let mut tx = self.begin().await?;
        let mut gate = lock_gate(&mut tx, gate_id, RowLock::Update).await?;

        if gate.status != transition.required_status() {
            return Err(StoreError::Precondition(Precondition::StatusMismatch {
                gate_id: gate_id.clone(),
                expected: transition.required_status(),
                found: gate.status,
            }));
        }

        if transition.target_status() == GateStatus::Completed {
            let blocking: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT id FROM gate_checklists
                 WHERE gate_id = $1 AND is_mandatory AND NOT is_completed
                 ORDER BY sort_order ASC, created_at ASC, id ASC
                "#,
            )
            .bind(gate_id.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            if !blocking.is_empty() {
                return Err(StoreError::Precondition(Precondition::MandatoryItemsOpen {
                    gate_id: gate_id.clone(),
                    blocking: blocking.into_iter().map(ChecklistItemId).collect(),
                }));
            }
        }

        gate.apply_transition(transition);
        write_gate(&mut tx, &gate).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(gate)
    }

    async fn update_gate(
        &self,
        gate_id: &GateId,
        patch: &GatePatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Gate> {
        let mut tx = self.begin().await?;
        let mut gate = lock_gate(&mut tx, gate_id, RowLock::Update).await?;
        if gate.is_completed() {
            return Err(StoreError::Precondition(Precondition::GateCompleted(
                gate_id.clone(),
            )));
        }
        gate.apply_patch(patch, at);
        write_gate(&mut tx, &gate).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(gate)
    }

    async fn delete_gate(&self, gate_id: &GateId) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let gate = lock_gate(&mut tx, gate_id, RowLock::Update).await?;
        if gate.is_completed() {
            return Err(StoreError::Precondition(Precondition::GateCompleted(
                gate_id.clone(),
            )));
        }
        sqlx::query("DELETE FROM gate_checklists WHERE gate_id = $1")
            .bind(gate_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM gates WHERE id = $1")
            .bind(gate_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ChecklistRepository for PostgresGateStore {
    async fn add_item(&self, item: ChecklistItem) -> StoreResult<ChecklistItem> {
        let mut tx = self.begin().await?;
        ensure_open(&mut tx, &item.gate_id).await?;
        insert_item(&mut tx, &item).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(item)
    }

    async fn get_item(&self, item_id: &ChecklistItemId) -> StoreResult<Option<ChecklistItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM gate_checklists WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(item_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(item_row_to_record).transpose()
    }

    async fn list_items(&self, gate_id: &GateId) -> StoreResult<Vec<ChecklistItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM gate_checklists WHERE gate_id = $1 \
             ORDER BY sort_order ASC, created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(gate_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(item_row_to_record).collect()
    }

    async fn list_items_for_gates(&self, gate_ids: &[GateId]) -> StoreResult<Vec<ChecklistItem>> {
        if gate_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = gate_ids.iter().map(|id| id.0.clone()).collect::<Vec<_>>();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM gate_checklists WHERE gate_id = ANY($1) \
             ORDER BY sort_order ASC, created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(item_row_to_record).collect()
    }

    async fn toggle_item(
        &self,
        item_id: &ChecklistItemId,
        toggle: &ChecklistToggle,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ChecklistItem> {
        let mut tx = self.begin().await?;
        let gate_id = parent_gate_of(&mut tx, item_id).await?;
        ensure_open(&mut tx, &gate_id).await?;

        let sql = format!("SELECT {ITEM_COLUMNS} FROM gate_checklists WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(item_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::NotFound(Missing::ChecklistItem(item_id.clone())))?;
        let mut item = item_row_to_record(&row)?;
        item.apply_toggle(toggle, actor, at);

        sqlx::query(
            r#"
            UPDATE gate_checklists
               SET is_completed = $2,
                   completed_at = $3,
                   completed_by = $4,
                   evidence_url = $5,
                   notes = $6
             WHERE id = $1
            "#,
        )
        .bind(item.id.as_str())
        .bind(item.is_completed)
        .bind(item.completed_at)
        .bind(item.completed_by.as_ref().map(UserId::as_str))
        .bind(item.evidence_url.as_deref())
        .bind(item.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(item)
    }

    async fn delete_item(&self, item_id: &ChecklistItemId) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let gate_id = parent_gate_of(&mut tx, item_id).await?;
        ensure_open(&mut tx, &gate_id).await?;
        sqlx::query("DELETE FROM gate_checklists WHERE id = $1")
            .bind(item_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum RowLock {
    Update,
    Share,
}

impl RowLock {
    fn clause(self) -> &'static str {
        match self {
            RowLock::Update => "FOR UPDATE",
            RowLock::Share => "FOR SHARE",
        }
    }
}

async fn lock_gate(
    tx: &mut Transaction<'static, Postgres>,
    gate_id: &GateId,
    lock: RowLock,
) -> StoreResult<Gate> {
    let sql = format!("SELECT {GATE_COLUMNS} FROM gates WHERE id = $1 {}", lock.clause());
    let row = sqlx::query(&sql)
        .bind(gate_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| StoreError::NotFound(Missing::Gate(gate_id.clone())))?;
    gate_row_to_record(&row)
}

async fn ensure_open(tx: &mut Transaction<'static, Postgres>, gate_id: &GateId) -> StoreResult<()> {
    let gate = lock_gate(tx, gate_id, RowLock::Share).await?;
    if gate.is_completed() {
        return Err(StoreError::Precondition(Precondition::GateCompleted(
            gate_id.clone(),
        )));
    }
    Ok(())
}

async fn parent_gate_of(
    tx: &mut Transaction<'static, Postgres>,
    item_id: &ChecklistItemId,
) -> StoreResult<GateId> {
    let gate_id: Option<String> =
        sqlx::query_scalar("SELECT gate_id FROM gate_checklists WHERE id = $1")
            .bind(item_id.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
    gate_id
        .map(GateId)
        .ok_or_else(|| StoreError::NotFound(Missing::ChecklistItem(item_id.clone())))
}

async fn write_gate(tx: &mut Transaction<'static, Postgres>, gate: &Gate) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE gates
           SET status = $2,
               started_at = $3,
               completed_at = $4,
               approved_by = $5,
               approver_role = $6,
               notes = $7,
               updated_at = $8
         WHERE id = $1
        "#,
    )
    .bind(gate.id.as_str())
    .bind(gate.status.as_str())
    .bind(gate.started_at)
    .bind(gate.completed_at)
    .bind(gate.approved_by.as_ref().map(UserId::as_str))
    .bind(gate.approver_role.as_deref())
    .bind(gate.notes.as_deref())
    .bind(gate.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn insert_item(tx: &mut Transaction<'static, Postgres>, item: &ChecklistItem) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO gate_checklists
            (id, gate_id, item, is_mandatory, is_completed, assigned_to,
             completed_at, completed_by, evidence_url, notes, sort_order, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(item.id.as_str())
    .bind(item.gate_id.as_str())
    .bind(item.item.as_str())
    .bind(item.is_mandatory)
    .bind(item.is_completed)
    .bind(item.assigned_to.as_ref().map(UserId::as_str))
    .bind(item.completed_at)
    .bind(item.completed_by.as_ref().map(UserId::as_str))
    .bind(item.evidence_url.as_deref())
    .bind(item.notes.as_deref())
    .bind(item.sort_order)
    .bind(item.created_at)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &GateFilter) {
    builder.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str().to_string());
    }
    if let Some(number) = filter.gate_number {
        builder
            .push(" AND gate_number = ")
            .push_bind(gate_number_to_i16(number));
    }
    if let Some(player_id) = &filter.player_id {
        builder.push(" AND player_id = ").push_bind(player_id.0.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(&search.term));
        let player_ids = search
            .player_ids
            .iter()
            .map(|id| id.0.clone())
            .collect::<Vec<_>>();
        builder
            .push(" AND (notes ILIKE ")
            .push_bind(pattern)
            .push(" OR player_id = ANY(")
            .push_bind(player_ids)
            .push("))");
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn gate_row_to_record(row: &PgRow) -> StoreResult<Gate> {
    let number: i16 = row
        .try_get("gate_number")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let approved_by: Option<String> = row
        .try_get("approved_by")
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(Gate {
        id: GateId(
            row.try_get("id")
                .map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        player_id: PlayerId(
            row.try_get("player_id")
                .map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        gate_number: parse_gate_number(number)?,
        status: status
            .parse()
            .map_err(|e: gate_types::InputError| StoreError::Serialization(e.to_string()))?,
        started_at: row
            .try_get("started_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        completed_at: row
            .try_get("completed_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        approved_by: approved_by.map(UserId),
        approver_role: row
            .try_get("approver_role")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        notes: row
            .try_get("notes")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn item_row_to_record(row: &PgRow) -> StoreResult<ChecklistItem> {
    let assigned_to: Option<String> = row
        .try_get("assigned_to")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let completed_by: Option<String> = row
        .try_get("completed_by")
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(ChecklistItem {
        id: ChecklistItemId(
            row.try_get("id")
                .map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        gate_id: GateId(
            row.try_get("gate_id")
                .map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        item: row
            .try_get("item")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        is_mandatory: row
            .try_get("is_mandatory")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        is_completed: row
            .try_get("is_completed")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        assigned_to: assigned_to.map(UserId),
        completed_at: row
            .try_get("completed_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        completed_by: completed_by.map(UserId),
        evidence_url: row
            .try_get("evidence_url")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        notes: row
            .try_get("notes")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        sort_order: row
            .try_get("sort_order")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn gate_number_to_i16(number: GateNumber) -> i16 {
    i16::from(number.index())
}

fn parse_gate_number(raw: i16) -> StoreResult<GateNumber> {
    u8::try_from(raw)
        .map_err(|_| StoreError::Serialization(format!("unknown gate number `{raw}`")))
        .and_then(|n| {
            GateNumber::try_from(n).map_err(|e| StoreError::Serialization(e.to_string()))
        })
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => return StoreError::Conflict(db_err.message().to_string()),
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001") | Some("40P01") | Some("55P03") => {
                warn!(code = ?db_err.code(), "transient postgres failure");
                return StoreError::Retryable(db_err.message().to_string());
            }
            _ => {}
        },
        sqlx::Error::PoolTimedOut => {
            return StoreError::Retryable("connection pool timed out".to_string());
        }
        _ => {}
    }
    StoreError::Backend(err.to_string())
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("page offset too large".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn gate_numbers_outside_range_are_rejected() {
        assert_eq!(parse_gate_number(2).unwrap(), GateNumber::Two);
        assert!(parse_gate_number(4).is_err());
        assert!(parse_gate_number(-1).is_err());
    }
}
