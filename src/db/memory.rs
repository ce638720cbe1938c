use crate::db::repository::{RepoError, RepoResult, Repository};
use crate::models::{
    AutoApprovalSettings, DiscountOffer, Invoice, InvoiceStatus, InvoiceUpdate,
    NewAutoApprovalSettings, NewDiscountOffer, NewInvoice, OfferDecision, OfferStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

/// 发票与要约放在同一把锁下, 保证跨表状态流转的原子性
#[derive(Debug, Default)]
struct Tables {
    invoices: BTreeMap<i64, Invoice>,
    offers: BTreeMap<i64, DiscountOffer>,
    next_invoice_id: i64,
    next_offer_id: i64,
}

impl Tables {
    fn insert_invoice(&mut self, new: NewInvoice) -> Invoice {
        self.next_invoice_id += 1;
        let invoice = new.into_invoice(self.next_invoice_id, Utc::now());
        self.invoices.insert(invoice.id, invoice.clone());
        invoice
    }

    fn insert_offer(&mut self, new: NewDiscountOffer) -> DiscountOffer {
        self.next_offer_id += 1;
        let offer = new.into_offer(self.next_offer_id, Utc::now());
        self.offers.insert(offer.id, offer.clone());
        offer
    }

    fn offers_where(&self, pred: impl Fn(&DiscountOffer) -> bool) -> Vec<DiscountOffer> {
        self.offers.values().filter(|o| pred(o)).cloned().collect()
    }
}

/// 内存存储
///
/// 每个实例独立持有数据, 由调用方注入到服务中。
#[derive(Debug, Default)]
pub struct MemRepository {
    tables: Mutex<Tables>,
    settings: DashMap<String, AutoApprovalSettings>,
    next_settings_id: AtomicI64,
}

impl MemRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemRepository {
    async fn create_invoices(&self, invoices: Vec<NewInvoice>) -> RepoResult<Vec<Invoice>> {
        let mut tables = self.tables.lock().await;
        Ok(invoices
            .into_iter()
            .map(|new| tables.insert_invoice(new))
            .collect())
    }

    async fn get_invoice(&self, id: i64) -> RepoResult<Option<Invoice>> {
        Ok(self.tables.lock().await.invoices.get(&id).cloned())
    }

    async fn list_invoices_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<Invoice>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invoices
            .values()
            .filter(|i| i.supplier_id == supplier_id)
            .cloned()
            .collect())
    }

    async fn update_invoice(
        &self,
        id: i64,
        expected: InvoiceStatus,
        update: &InvoiceUpdate,
    ) -> RepoResult<Invoice> {
        let mut tables = self.tables.lock().await;
        let invoice = tables
            .invoices
            .get_mut(&id)
            .ok_or(RepoError::NotFound { entity: "Invoice", id })?;
        if invoice.status != expected {
            return Err(RepoError::invoice_conflict(id, expected, invoice.status));
        }
        update.apply(invoice);
        Ok(invoice.clone())
    }

    async fn get_offer(&self, id: i64) -> RepoResult<Option<DiscountOffer>> {
        Ok(self.tables.lock().await.offers.get(&id).cloned())
    }

    async fn list_pending_offers(&self) -> RepoResult<Vec<DiscountOffer>> {
        let tables = self.tables.lock().await;
        Ok(tables.offers_where(|o| o.status == OfferStatus::Pending))
    }

    async fn list_accepted_offers(&self) -> RepoResult<Vec<DiscountOffer>> {
        let tables = self.tables.lock().await;
        Ok(tables.offers_where(|o| o.status == OfferStatus::Accepted))
    }

    async fn list_offers_by_supplier(&self, supplier_id: &str) -> RepoResult<Vec<DiscountOffer>> {
        let tables = self.tables.lock().await;
        Ok(tables.offers_where(|o| o.supplier_id == supplier_id))
    }

    async fn submit_offer(&self, offer: NewDiscountOffer) -> RepoResult<DiscountOffer> {
        let mut tables = self.tables.lock().await;
        let invoice_id = offer.invoice_id;

        let status = tables
            .invoices
            .get(&invoice_id)
            .map(|i| i.status)
            .ok_or(RepoError::NotFound { entity: "Invoice", id: invoice_id })?;
        if status != InvoiceStatus::Pending {
            return Err(RepoError::invoice_conflict(
                invoice_id,
                InvoiceStatus::Pending,
                status,
            ));
        }
        if tables
            .offers
            .values()
            .any(|o| o.invoice_id == invoice_id && o.status == OfferStatus::Pending)
        {
            return Err(RepoError::DuplicateActiveOffer(invoice_id));
        }

        let created = tables.insert_offer(offer);
        if let Some(invoice) = tables.invoices.get_mut(&invoice_id) {
            invoice.status = InvoiceStatus::PendingApproval;
        }
        Ok(created)
    }

    async fn decide_offer(&self, id: i64, decision: OfferDecision) -> RepoResult<DiscountOffer> {
        let mut tables = self.tables.lock().await;

        let (offer_status, invoice_id) = tables
            .offers
            .get(&id)
            .map(|o| (o.status, o.invoice_id))
            .ok_or(RepoError::NotFound { entity: "Discount offer", id })?;
        if offer_status != OfferStatus::Pending {
            return Err(RepoError::offer_conflict(id, offer_status));
        }

        // 先校验发票, 校验失败时不改动任何数据
        if decision == OfferDecision::Accept {
            let invoice_status = tables
                .invoices
                .get(&invoice_id)
                .map(|i| i.status)
                .ok_or(RepoError::NotFound { entity: "Invoice", id: invoice_id })?;
            if invoice_status != InvoiceStatus::PendingApproval {
                return Err(RepoError::invoice_conflict(
                    invoice_id,
                    InvoiceStatus::PendingApproval,
                    invoice_status,
                ));
            }
            if let Some(invoice) = tables.invoices.get_mut(&invoice_id) {
                invoice.status = InvoiceStatus::Completed;
            }
        }

        let offer = tables
            .offers
            .get_mut(&id)
            .ok_or(RepoError::NotFound { entity: "Discount offer", id })?;
        offer.status = decision.status();
        Ok(offer.clone())
    }

    async fn get_settings(&self, user_id: &str) -> RepoResult<Option<AutoApprovalSettings>> {
        Ok(self.settings.get(user_id).map(|s| s.value().clone()))
    }

    async fn upsert_settings(
        &self,
        settings: NewAutoApprovalSettings,
    ) -> RepoResult<AutoApprovalSettings> {
        let now = Utc::now();
        let entry = self
            .settings
            .entry(settings.user_id.clone())
            .and_modify(|existing| {
                existing.enabled = settings.enabled;
                existing.max_discount_rate = settings.max_discount_rate;
                existing.max_amount = settings.max_amount;
                existing.updated_at = now;
            })
            .or_insert_with(|| {
                let id = self.next_settings_id.fetch_add(1, Ordering::SeqCst) + 1;
                settings.clone().into_settings(id, now)
            });
        Ok(entry.value().clone())
    }

    async fn unique_buyers(&self) -> RepoResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let buyers: IndexSet<String> = tables
            .invoices
            .values()
            .map(|i| i.buyer_name.clone())
            .collect();
        Ok(buyers.into_iter().collect())
    }

    async fn unique_suppliers(&self) -> RepoResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let suppliers: IndexSet<String> = tables
            .offers
            .values()
            .map(|o| o.supplier_name.clone())
            .collect();
        Ok(suppliers.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_invoice(number: &str, buyer: &str, status: InvoiceStatus) -> NewInvoice {
        NewInvoice {
            invoice_number: number.to_string(),
            invoice_amount: 1000.0,
            invoice_date: date(2030, 1, 1),
            due_date: date(2030, 3, 1),
            buyer_name: buyer.to_string(),
            status,
            supplier_id: "supplier1".to_string(),
        }
    }

    fn new_offer(invoice_id: i64) -> NewDiscountOffer {
        NewDiscountOffer {
            invoice_id,
            original_amount: 1000.0,
            discount_rate: 2.0,
            discounted_amount: 980.0,
            discount_value: 20.0,
            early_payment_date: date(2030, 1, 2),
            dcf_value: 970.0,
            supplier_id: "supplier1".to_string(),
            supplier_name: "supplier1".to_string(),
        }
    }

    #[tokio::test]
    async fn submit_moves_invoice_to_pending_approval() {
        let repo = MemRepository::new();
        let invoice = repo
            .create_invoices(vec![new_invoice("A", "Acme", InvoiceStatus::Pending)])
            .await
            .unwrap()
            .remove(0);

        let offer = repo.submit_offer(new_offer(invoice.id)).await.unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);

        let invoice = repo.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PendingApproval);
    }

    #[tokio::test]
    async fn submit_requires_pending_invoice() {
        let repo = MemRepository::new();
        let invoice = repo
            .create_invoices(vec![new_invoice("A", "Acme", InvoiceStatus::Completed)])
            .await
            .unwrap()
            .remove(0);

        let err = repo.submit_offer(new_offer(invoice.id)).await.unwrap_err();
        assert!(matches!(err, RepoError::StatusConflict { .. }));
        assert!(repo.list_pending_offers().await.unwrap().is_empty());

        let err = repo.submit_offer(new_offer(999)).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id: 999, .. }));
    }

    #[tokio::test]
    async fn accepting_completes_invoice_and_rejecting_does_not() {
        let repo = MemRepository::new();
        let invoices = repo
            .create_invoices(vec![
                new_invoice("A", "Acme", InvoiceStatus::Pending),
                new_invoice("B", "Globex", InvoiceStatus::Pending),
            ])
            .await
            .unwrap();
        let accepted = repo.submit_offer(new_offer(invoices[0].id)).await.unwrap();
        let rejected = repo.submit_offer(new_offer(invoices[1].id)).await.unwrap();

        let accepted = repo.decide_offer(accepted.id, OfferDecision::Accept).await.unwrap();
        let rejected = repo.decide_offer(rejected.id, OfferDecision::Reject).await.unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);
        assert_eq!(rejected.status, OfferStatus::Rejected);

        let a = repo.get_invoice(invoices[0].id).await.unwrap().unwrap();
        let b = repo.get_invoice(invoices[1].id).await.unwrap().unwrap();
        assert_eq!(a.status, InvoiceStatus::Completed);
        assert_eq!(b.status, InvoiceStatus::PendingApproval);

        // 终态不可再变
        let err = repo.decide_offer(accepted.id, OfferDecision::Reject).await.unwrap_err();
        assert!(matches!(err, RepoError::StatusConflict { .. }));
    }

    #[tokio::test]
    async fn concurrent_decisions_have_a_single_winner() {
        let repo = Arc::new(MemRepository::new());
        let invoice = repo
            .create_invoices(vec![new_invoice("A", "Acme", InvoiceStatus::Pending)])
            .await
            .unwrap()
            .remove(0);
        let offer = repo.submit_offer(new_offer(invoice.id)).await.unwrap();

        let r1 = Arc::clone(&repo);
        let r2 = Arc::clone(&repo);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { r1.decide_offer(offer.id, OfferDecision::Accept).await }),
            tokio::spawn(async move { r2.decide_offer(offer.id, OfferDecision::Reject).await }),
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

        let winner = outcomes.iter().find_map(|r| r.as_ref().ok()).unwrap();
        let stored = repo.get_offer(offer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, winner.status);
    }

    #[tokio::test]
    async fn update_is_conditional_on_expected_status() {
        let repo = MemRepository::new();
        let invoice = repo
            .create_invoices(vec![new_invoice("A", "Acme", InvoiceStatus::Pending)])
            .await
            .unwrap()
            .remove(0);

        let update = InvoiceUpdate {
            buyer_name: Some("Acme Ltd".into()),
            ..Default::default()
        };
        let err = repo
            .update_invoice(invoice.id, InvoiceStatus::Completed, &update)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::StatusConflict { .. }));

        let updated = repo
            .update_invoice(invoice.id, InvoiceStatus::Pending, &update)
            .await
            .unwrap();
        assert_eq!(updated.buyer_name, "Acme Ltd");
    }

    #[tokio::test]
    async fn settings_upsert_keeps_one_row_per_user() {
        let repo = MemRepository::new();
        let input = NewAutoApprovalSettings {
            user_id: "buyer1".into(),
            enabled: true,
            max_discount_rate: 3.0,
            max_amount: 50_000.0,
        };
        let first = repo.upsert_settings(input.clone()).await.unwrap();
        let second = repo
            .upsert_settings(NewAutoApprovalSettings {
                max_amount: 75_000.0,
                ..input
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.max_amount, 75_000.0);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(repo.get_settings("buyer1").await.unwrap(), Some(second));
        assert_eq!(repo.get_settings("buyer2").await.unwrap(), None);
    }
}
