pub mod invoice;
pub mod kpi;
pub mod offer;
pub mod settings;

pub use invoice::{Invoice, InvoiceStatus, InvoiceUpdate, NewInvoice};
pub use kpi::{KpiSummary, Role};
pub use offer::{DiscountOffer, NewDiscountOffer, OfferDecision, OfferStatus, OfferWithInvoice};
pub use settings::{ApprovalThresholds, AutoApprovalSettings, NewAutoApprovalSettings, SettingsView};
