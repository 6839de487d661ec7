//! # Transaction Types
//!
//! The collaborator hands the engine a loosely-shaped [`TransactionDraft`];
//! the coordinator turns it into a canonical [`Transaction`] that is sent,
//! byte for byte, on every delivery attempt.
//!
//! ## Preparation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TransactionDraft                      Transaction                      │
//! │  ────────────────                      ───────────                      │
//! │  requestId?        ──────────────────► requestId  (UUID v4 if absent)   │
//! │  vendor? / supplier?                   vendor     ("Unknown Vendor")    │
//! │  invoiceNumber? / invoiceNo?           invoiceNumber (INV-<millis>)     │
//! │  invoiceDate? / date?                  invoiceDate   (today, UTC)       │
//! │  items[] (qty, price, sku aliases)     items[] + total = price × qty    │
//! │  subtotal? tax? total?                 subtotal, tax, total             │
//! │  images[] (URIs)   ── courier-sync ──► images[] (inline base64, or null)│
//! │                                        metadata { source, timestamp,    │
//! │                                          isMultiPage, pageCount }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Image loading is I/O and therefore lives in `courier-sync`; this module
//! only receives the already-encoded slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{DEFAULT_SOURCE, DEFAULT_VENDOR};

// =============================================================================
// Draft (collaborator input)
// =============================================================================

/// A line item as produced by the scanning UI.
///
/// Accepts the field spellings the various capture screens emit
/// (`qty`, `price`, `unitPrice`, `sku`, `productName`, `cost`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    #[serde(default, alias = "sku")]
    pub barcode: Option<String>,

    #[serde(default, alias = "productName")]
    pub name: String,

    #[serde(default, alias = "qty")]
    pub quantity: i64,

    #[serde(default, alias = "cost")]
    pub cost_price: Option<f64>,

    #[serde(default, alias = "price", alias = "unitPrice")]
    pub selling_price: f64,
}

impl DraftItem {
    /// Creates a draft item with just the fields validation cares about.
    pub fn new(name: impl Into<String>, quantity: i64, selling_price: f64) -> Self {
        DraftItem {
            barcode: None,
            name: name.into(),
            quantity,
            cost_price: None,
            selling_price,
        }
    }

    /// Sets the barcode.
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Sets the cost price.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_price = Some(cost);
        self
    }
}

/// Reference to a captured page image, resolvable to bytes by an image source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// `file://` URI, plain path, or `data:` URI.
    pub uri: String,

    /// 1-based page number. Defaults to the position in the list.
    #[serde(default)]
    pub page_number: Option<u32>,

    /// Explicit MIME type. Inferred from the URI when absent.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        ImageRef {
            uri: uri.into(),
            page_number: None,
            mime_type: None,
        }
    }
}

/// Transaction as handed over by the collaborator, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default, alias = "supplier")]
    pub vendor: Option<String>,

    #[serde(default, alias = "invoiceNo")]
    pub invoice_number: Option<String>,

    #[serde(default, alias = "date")]
    pub invoice_date: Option<String>,

    #[serde(default)]
    pub items: Vec<DraftItem>,

    #[serde(default)]
    pub subtotal: Option<f64>,

    #[serde(default)]
    pub tax: Option<f64>,

    #[serde(default)]
    pub total: Option<f64>,

    #[serde(default)]
    pub images: Vec<ImageRef>,

    /// Provenance tag (e.g. "camera", "manual_entry").
    #[serde(default)]
    pub source: Option<String>,
}

// =============================================================================
// Canonical Transaction
// =============================================================================

/// One normalized line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub barcode: String,
    pub name: String,
    pub quantity: i64,
    pub cost_price: f64,
    pub selling_price: f64,
    /// `selling_price × quantity`, rounded to cents.
    pub total: f64,
}

/// A page image encoded inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceImage {
    /// Standard base64 of the raw file bytes.
    pub encoded_bytes: String,
    pub page_number: u32,
    pub mime_type: String,
}

/// Provenance block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    pub source: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub is_multi_page: bool,
    pub page_count: u32,
    /// Pages whose bytes could not be read; their slots in `images` are null.
    #[serde(default)]
    pub failed_images: u32,
}

/// The canonical, channel-agnostic delivery payload.
///
/// Immutable once handed to a delivery channel: every retry resends exactly
/// this value, and backends deduplicate on `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub request_id: String,
    pub vendor: String,
    pub invoice_number: String,
    pub invoice_date: String,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    /// One slot per submitted page; `None` marks a page that failed to encode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Option<InvoiceImage>>,
    pub metadata: TransactionMetadata,
}

impl Transaction {
    /// Normalizes a validated draft into the canonical payload.
    ///
    /// `images` must already be resolved, one slot per `draft.images` entry.
    pub fn from_draft(
        draft: TransactionDraft,
        images: Vec<Option<InvoiceImage>>,
        now: DateTime<Utc>,
    ) -> Self {
        let items: Vec<LineItem> = draft.items.into_iter().map(LineItem::from).collect();

        let subtotal = draft
            .subtotal
            .unwrap_or_else(|| round_currency(items.iter().map(|i| i.total).sum()));
        let tax = draft.tax.unwrap_or(0.0);
        let total = draft.total.unwrap_or_else(|| round_currency(subtotal + tax));

        let page_count = images.len() as u32;
        let failed_images = images.iter().filter(|slot| slot.is_none()).count() as u32;

        Transaction {
            request_id: non_blank(draft.request_id).unwrap_or_else(|| Uuid::new_v4().to_string()),
            vendor: non_blank(draft.vendor).unwrap_or_else(|| DEFAULT_VENDOR.to_string()),
            invoice_number: non_blank(draft.invoice_number)
                .unwrap_or_else(|| format!("INV-{}", now.timestamp_millis())),
            invoice_date: non_blank(draft.invoice_date)
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            items,
            subtotal,
            tax,
            total,
            images,
            metadata: TransactionMetadata {
                source: non_blank(draft.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                timestamp: now,
                is_multi_page: page_count > 1,
                page_count,
                failed_images,
            },
        }
    }

    /// Number of pages that were encoded successfully.
    pub fn encoded_image_count(&self) -> usize {
        self.images.iter().filter(|slot| slot.is_some()).count()
    }
}

impl From<DraftItem> for LineItem {
    fn from(item: DraftItem) -> Self {
        let total = round_currency(item.selling_price * item.quantity as f64);
        LineItem {
            barcode: item.barcode.map(|b| b.trim().to_string()).unwrap_or_default(),
            name: item.name.trim().to_string(),
            quantity: item.quantity,
            cost_price: item.cost_price.unwrap_or(0.0),
            selling_price: item.selling_price,
            total,
        }
    }
}

/// Rounds to two decimal places.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_from_draft_fills_defaults() {
        let draft = TransactionDraft {
            items: vec![DraftItem::new("Cola", 3, 1.25)],
            ..Default::default()
        };

        let tx = Transaction::from_draft(draft, Vec::new(), fixed_now());

        assert!(Uuid::parse_str(&tx.request_id).is_ok());
        assert_eq!(tx.vendor, DEFAULT_VENDOR);
        assert_eq!(tx.invoice_number, format!("INV-{}", fixed_now().timestamp_millis()));
        assert_eq!(tx.invoice_date, "2024-03-09");
        assert_eq!(tx.items[0].total, 3.75);
        assert_eq!(tx.subtotal, 3.75);
        assert_eq!(tx.tax, 0.0);
        assert_eq!(tx.total, 3.75);
        assert_eq!(tx.metadata.source, DEFAULT_SOURCE);
        assert!(!tx.metadata.is_multi_page);
    }

    #[test]
    fn test_from_draft_keeps_supplied_values() {
        let draft = TransactionDraft {
            request_id: Some("req-1".into()),
            vendor: Some("  Acme Wholesale ".into()),
            invoice_number: Some("A-77".into()),
            invoice_date: Some("2024-01-02".into()),
            items: vec![DraftItem::new("Bread", 1, 2.0)],
            subtotal: Some(2.0),
            tax: Some(0.16),
            total: None,
            ..Default::default()
        };

        let tx = Transaction::from_draft(draft, Vec::new(), fixed_now());

        assert_eq!(tx.request_id, "req-1");
        assert_eq!(tx.vendor, "Acme Wholesale");
        assert_eq!(tx.invoice_number, "A-77");
        assert_eq!(tx.total, 2.16);
    }

    #[test]
    fn test_blank_request_id_is_regenerated() {
        let draft = TransactionDraft {
            request_id: Some("   ".into()),
            items: vec![DraftItem::new("Milk", 1, 1.0)],
            ..Default::default()
        };

        let tx = Transaction::from_draft(draft, Vec::new(), fixed_now());
        assert_ne!(tx.request_id.trim(), "");
    }

    #[test]
    fn test_field_aliases_are_normalized() {
        let json = r#"{
            "supplier": "Metro",
            "invoiceNo": "M-1",
            "items": [
                { "sku": "5000112637922", "productName": "Sprite", "qty": 4, "price": 0.9, "cost": 0.5 }
            ]
        }"#;

        let draft: TransactionDraft = serde_json::from_str(json).unwrap();
        let tx = Transaction::from_draft(draft, Vec::new(), fixed_now());

        assert_eq!(tx.vendor, "Metro");
        assert_eq!(tx.invoice_number, "M-1");
        assert_eq!(tx.items[0].barcode, "5000112637922");
        assert_eq!(tx.items[0].name, "Sprite");
        assert_eq!(tx.items[0].cost_price, 0.5);
        assert_eq!(tx.items[0].total, 3.6);
    }

    #[test]
    fn test_failed_image_slots_are_counted() {
        let draft = TransactionDraft {
            items: vec![DraftItem::new("Eggs", 1, 3.0)],
            ..Default::default()
        };
        let page = InvoiceImage {
            encoded_bytes: "AAAA".into(),
            page_number: 1,
            mime_type: "image/jpeg".into(),
        };

        let tx = Transaction::from_draft(draft, vec![Some(page), None], fixed_now());

        assert_eq!(tx.metadata.page_count, 2);
        assert_eq!(tx.metadata.failed_images, 1);
        assert!(tx.metadata.is_multi_page);
        assert_eq!(tx.encoded_image_count(), 1);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let draft = TransactionDraft {
            request_id: Some("req-9".into()),
            items: vec![DraftItem::new("Tea", 1, 4.0).with_barcode("123")],
            ..Default::default()
        };
        let tx = Transaction::from_draft(draft, Vec::new(), fixed_now());

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["requestId"], "req-9");
        assert_eq!(value["items"][0]["sellingPrice"], 4.0);
        assert_eq!(value["metadata"]["isMultiPage"], false);
        assert!(value.get("images").is_none());
    }
}
