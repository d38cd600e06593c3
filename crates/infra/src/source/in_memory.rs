use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;

use super::{InvoiceRow, InvoiceSource, LineItemRow, SourceError};

/// In-memory invoice source for tests and local development.
///
/// Invoices are returned in insertion order; re-inserting an id replaces the
/// invoice in place. Every write is a single push or slot replacement, so a
/// poisoned lock still guards a whole table and is recovered.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceSource {
    inner: RwLock<Vec<(InvoiceRow, Vec<LineItemRow>)>>,
}

impl InMemoryInvoiceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invoice: InvoiceRow, items: Vec<LineItemRow>) {
        let mut rows = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match rows.iter_mut().find(|(row, _)| row.id == invoice.id) {
            Some(slot) => *slot = (invoice, items),
            None => rows.push((invoice, items)),
        }
    }

    pub fn with_invoice(self, invoice: InvoiceRow, items: Vec<LineItemRow>) -> Self {
        self.insert(invoice, items);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(InvoiceRow, Vec<LineItemRow>)>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InvoiceSource for InMemoryInvoiceSource {
    async fn fetch_invoice(&self, id: &str) -> Result<Option<InvoiceRow>, SourceError> {
        Ok(self
            .read()
            .iter()
            .find(|(row, _)| row.id == id)
            .map(|(row, _)| row.clone()))
    }

    async fn fetch_all_invoices(&self) -> Result<Vec<InvoiceRow>, SourceError> {
        Ok(self.read().iter().map(|(row, _)| row.clone()).collect())
    }

    async fn fetch_items(&self, invoice_id: &str) -> Result<Vec<LineItemRow>, SourceError> {
        Ok(self
            .read()
            .iter()
            .find(|(row, _)| row.id == invoice_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> InvoiceRow {
        InvoiceRow {
            id: id.to_string(),
            ..InvoiceRow::default()
        }
    }

    #[tokio::test]
    async fn lookups_and_replacement() {
        let source = InMemoryInvoiceSource::new()
            .with_invoice(row("A"), vec![LineItemRow::default()])
            .with_invoice(row("B"), vec![]);

        assert!(source.fetch_invoice("A").await.unwrap().is_some());
        assert!(source.fetch_invoice("missing").await.unwrap().is_none());
        assert_eq!(source.fetch_items("A").await.unwrap().len(), 1);
        assert!(source.fetch_items("missing").await.unwrap().is_empty());

        source.insert(row("A"), vec![]);
        let ids: Vec<String> = source
            .fetch_all_invoices()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(source.fetch_items("A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn poisoned_lock_keeps_accepting_writes() {
        let source = std::sync::Arc::new(InMemoryInvoiceSource::new().with_invoice(row("A"), vec![]));
        let poisoner = source.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(source.inner.is_poisoned());

        source.insert(row("B"), vec![LineItemRow::default()]);
        assert_eq!(source.fetch_all_invoices().await.unwrap().len(), 2);
        assert_eq!(source.fetch_items("B").await.unwrap().len(), 1);
    }
}
