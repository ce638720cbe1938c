use crate::db::repository::{RepoError, RepoResult, Repository};
use crate::models::{
    AutoApprovalSettings, DiscountOffer, Invoice, InvoiceStatus, InvoiceUpdate,
    NewAutoApprovalSettings, NewDiscountOffer, NewInvoice, OfferDecision, OfferStatus,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::{Duration, Instant};

/// 单条 INSERT 语句的最大行数
const INSERT_CHUNK_SIZE: usize = 1000;
/// 单条 INSERT 语句的超时时间
const INSERT_TIMEOUT: Duration = Duration::from_secs(30);

const INVOICE_COLUMNS: &str = "id, invoice_number, invoice_amount, invoice_date, due_date, \
     buyer_name, status, supplier_id, created_at";

const OFFER_COLUMNS: &str = "id, invoice_id, original_amount, discount_rate, discounted_amount, \
     discount_value, early_payment_date, dcf_value, status, supplier_id, supplier_name, created_at";

/// PostgreSQL 存储
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 解析数据库中的状态文本
fn decode_status<T>(raw: String) -> Result<T, sqlx::Error>
where
    T: TryFrom<String, Error = String>,
{
    T::try_from(raw).map_err(|e| sqlx::Error::Decode(e.into()))
}

/// 锁定发票行并返回当前状态
async fn lock_invoice_status(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> RepoResult<InvoiceStatus> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT status FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
    let raw = raw.ok_or(RepoError::NotFound { entity: "Invoice", id })?;
    Ok(decode_status(raw)?)
}

async fn set_invoice_status(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    status: InvoiceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE invoices SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// 分块插入发票, 每块一条多值 INSERT, 带超时控制
async fn insert_invoice_chunk(
    tx: &mut Transaction<'_, Postgres>,
    chunk: &[NewInvoice],
) -> Result<Vec<Invoice>, sqlx::Error> {
    let start_time = Instant::now();

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO invoices (
            invoice_number, invoice_amount, invoice_date, due_date,
            buyer_name, status, supplier_id
        ) ",
    );
    query_builder.push_values(chunk, |mut b, invoice| {
        b.push_bind(&invoice.invoice_number)
            .push_bind(invoice.invoice_amount)
            .push_bind(invoice.invoice_date)
            .push_bind(invoice.due_date)
            .push_bind(&invoice.buyer_name)
            .push_bind(invoice.status.as_str())
            .push_bind(&invoice.supplier_id);
    });
    query_builder.push(" RETURNING ");
    query_builder.push(INVOICE_COLUMNS);

    let execute_result = tokio::time::timeout(
        INSERT_TIMEOUT,
        query_builder
            .build_query_as::<Invoice>()
            .fetch_all(&mut **tx),
    )
    .await;

    match execute_result {
        Ok(Ok(rows)) => {
            tracing::debug!("✓ INSERT执行成功, {} 行, 耗时: {:?}", rows.len(), start_time.elapsed());
            Ok(rows)
        }
        Ok(Err(e)) => {
            tracing::error!("✗ INSERT执行失败, 耗时: {:?}, 错误: {:?}", start_time.elapsed(), e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("✗ INSERT操作超时 (>{}秒)!", INSERT_TIMEOUT.as_secs());
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_invoices(&self, invoices: Vec<NewInvoice>) -> RepoResult<Vec<Invoice>> {
        if invoices.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(invoices.len());
        for chunk in invoices.chunks(INSERT_CHUNK_SIZE) {
            created.extend(insert_invoice_chunk(&mut tx, chunk).await?);
        }
        tx.commit().await?;

        tracing::info!("批量写入发票 {} 张", created.len());
        Ok(created)
    }

    async fn get_invoice(&self, id: i64) -> RepoResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_invoices_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<Invoice>> {
        let sql =
            format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE supplier_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_invoice(
        &self,
        id: i64,
        expected: InvoiceStatus,
        update: &InvoiceUpdate,
    ) -> RepoResult<Invoice> {
        let sql = format!(
            r#"
            UPDATE invoices SET
                invoice_number = COALESCE($3, invoice_number),
                invoice_amount = COALESCE($4, invoice_amount),
                invoice_date   = COALESCE($5, invoice_date),
                due_date       = COALESCE($6, due_date),
                buyer_name     = COALESCE($7, buyer_name)
            WHERE id = $1 AND status = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(update.invoice_number.as_deref())
            .bind(update.invoice_amount)
            .bind(update.invoice_date)
            .bind(update.due_date)
            .bind(update.buyer_name.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(invoice) => Ok(invoice),
            None => match self.get_invoice(id).await? {
                Some(current) => Err(RepoError::invoice_conflict(id, expected, current.status)),
                None => Err(RepoError::NotFound { entity: "Invoice", id }),
            },
        }
    }

    async fn get_offer(&self, id: i64) -> RepoResult<Option<DiscountOffer>> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM discount_offers WHERE id = $1");
        Ok(sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_pending_offers(&self) -> RepoResult<Vec<DiscountOffer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM discount_offers WHERE status = $1 ORDER BY id"
        );
        Ok(sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(OfferStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_accepted_offers(&self) -> RepoResult<Vec<DiscountOffer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM discount_offers WHERE status = $1 ORDER BY id"
        );
        Ok(sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(OfferStatus::Accepted.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_offers_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<DiscountOffer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM discount_offers WHERE supplier_id = $1 ORDER BY id"
        );
        Ok(sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn submit_offer(&self, offer: NewDiscountOffer) -> RepoResult<DiscountOffer> {
        let invoice_id = offer.invoice_id;
        let mut tx = self.pool.begin().await?;

        let status = lock_invoice_status(&mut tx, invoice_id).await?;
        if status != InvoiceStatus::Pending {
            return Err(RepoError::invoice_conflict(
                invoice_id,
                InvoiceStatus::Pending,
                status,
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO discount_offers (
                invoice_id, original_amount, discount_rate, discounted_amount,
                discount_value, early_payment_date, dcf_value, status,
                supplier_id, supplier_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {OFFER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(invoice_id)
            .bind(offer.original_amount)
            .bind(offer.discount_rate)
            .bind(offer.discounted_amount)
            .bind(offer.discount_value)
            .bind(offer.early_payment_date)
            .bind(offer.dcf_value)
            .bind(OfferStatus::Pending.as_str())
            .bind(&offer.supplier_id)
            .bind(&offer.supplier_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    RepoError::DuplicateActiveOffer(invoice_id)
                } else {
                    RepoError::Database(e)
                }
            })?;

        set_invoice_status(&mut tx, invoice_id, InvoiceStatus::PendingApproval).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn decide_offer(&self, id: i64, decision: OfferDecision) -> RepoResult<DiscountOffer> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT status, invoice_id FROM discount_offers WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (raw, invoice_id) = row.ok_or(RepoError::NotFound { entity: "Discount offer", id })?;
        let offer_status: OfferStatus = decode_status(raw)?;
        if offer_status != OfferStatus::Pending {
            return Err(RepoError::offer_conflict(id, offer_status));
        }

        if decision == OfferDecision::Accept {
            let invoice_status = lock_invoice_status(&mut tx, invoice_id).await?;
            if invoice_status != InvoiceStatus::PendingApproval {
                return Err(RepoError::invoice_conflict(
                    invoice_id,
                    InvoiceStatus::PendingApproval,
                    invoice_status,
                ));
            }
            set_invoice_status(&mut tx, invoice_id, InvoiceStatus::Completed).await?;
        }

        let sql = format!(
            "UPDATE discount_offers SET status = $2 WHERE id = $1 RETURNING {OFFER_COLUMNS}"
        );
        let decided = sqlx::query_as::<_, DiscountOffer>(&sql)
            .bind(id)
            .bind(decision.status().as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(decided)
    }

    async fn get_settings(&self, user_id: &str) -> RepoResult<Option<AutoApprovalSettings>> {
        Ok(sqlx::query_as::<_, AutoApprovalSettings>(
            r#"
            SELECT id, user_id, enabled, max_discount_rate, max_amount, created_at, updated_at
            FROM auto_approval_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_settings(
        &self,
        settings: NewAutoApprovalSettings,
    ) -> RepoResult<AutoApprovalSettings> {
        Ok(sqlx::query_as::<_, AutoApprovalSettings>(
            r#"
            INSERT INTO auto_approval_settings (user_id, enabled, max_discount_rate, max_amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                max_discount_rate = EXCLUDED.max_discount_rate,
                max_amount = EXCLUDED.max_amount,
                updated_at = now()
            RETURNING id, user_id, enabled, max_discount_rate, max_amount, created_at, updated_at
            "#,
        )
        .bind(&settings.user_id)
        .bind(settings.enabled)
        .bind(settings.max_discount_rate)
        .bind(settings.max_amount)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn unique_buyers(&self) -> RepoResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT buyer_name FROM invoices GROUP BY buyer_name ORDER BY MIN(id)",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn unique_suppliers(&self) -> RepoResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT supplier_name FROM discount_offers GROUP BY supplier_name ORDER BY MIN(id)",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
