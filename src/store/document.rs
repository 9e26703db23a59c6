/*
 * This file is part of the Obvia ERP.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::common::error::{CoreError, CoreResult};
use crate::store::{DocumentDriver, Filter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Generic typed CRUD over a document store with tenant-scoped filters and
/// restricted-field enforcement (C2, §4.2). One instance is constructed per
/// collection name (`tenants`, `users`, `roles`, `permissions`,
/// `audit_logs`, §6.3); entity repositories in `domain` wrap an instance of
/// this type rather than talking to a `DocumentDriver` directly.
pub struct DocumentCollection<T> {
    driver: Arc<dyn DocumentDriver>,
    collection: &'static str,
    _marker: PhantomData<T>,
}

impl<T> Clone for DocumentCollection<T> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T> DocumentCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(driver: Arc<dyn DocumentDriver>, collection: &'static str) -> Self {
        Self {
            driver,
            collection,
            _marker: PhantomData,
        }
    }

    pub async fn create(&self, id: &str, tenant_id: Option<&str>, entity: &T) -> CoreResult<()> {
        let body = serde_json::to_value(entity)
            .map_err(|e| CoreError::internal("INTERNAL_SERIALIZATION", "failed to encode document").with_cause(e))?;
        self.driver.create(self.collection, id, tenant_id, body).await
    }

    pub async fn find_one(&self, filter: &Filter) -> CoreResult<T> {
        match self.driver.find_one(self.collection, filter).await? {
            Some(doc) => Self::decode(doc.body),
            None => Err(CoreError::not_found(
                "NOT_FOUND_RESOURCE",
                format!("no document found in {}", self.collection),
            )
            .with_detail("resource_type", self.collection)),
        }
    }

    pub async fn find_one_opt(&self, filter: &Filter) -> CoreResult<Option<T>> {
        match self.driver.find_one(self.collection, filter).await? {
            Some(doc) => Ok(Some(Self::decode(doc.body)?)),
            None => Ok(None),
        }
    }

    pub async fn find_all(&self, filter: &Filter) -> CoreResult<Vec<T>> {
        let docs = self.driver.find_all(self.collection, filter).await?;
        docs.into_iter().map(|d| Self::decode(d.body)).collect()
    }

    pub async fn update(&self, filter: &Filter, entity: &T) -> CoreResult<()> {
        if filter.is_empty() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "update filter must not be empty",
            ));
        }
        let body = serde_json::to_value(entity)
            .map_err(|e| CoreError::internal("INTERNAL_SERIALIZATION", "failed to encode document").with_cause(e))?;
        self.driver.update(self.collection, filter, body).await
    }

    pub async fn delete(&self, filter: &Filter) -> CoreResult<()> {
        self.driver.delete(self.collection, filter).await
    }

    fn decode(body: serde_json::Value) -> CoreResult<T> {
        serde_json::from_value(body).map_err(|e| {
            CoreError::internal("INTERNAL_DESERIALIZATION", "failed to decode document").with_cause(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDocumentDriver;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: String,
        tenant_id: String,
        name: String,
    }

    fn collection() -> DocumentCollection<Widget> {
        DocumentCollection::new(Arc::new(MemoryDocumentDriver::new()), "widgets")
    }

    #[tokio::test]
    async fn create_then_find_one_round_trips() {
        let col = collection();
        let widget = Widget {
            id: "w1".into(),
            tenant_id: "t1".into(),
            name: "gear".into(),
        };
        col.create("w1", Some("t1"), &widget).await.unwrap();

        let found = col
            .find_one(&Filter::new().eq("tenant_id", "t1").eq("id", "w1"))
            .await
            .unwrap();
        assert_eq!(found, widget);
    }

    #[tokio::test]
    async fn find_one_missing_is_not_found() {
        let col = collection();
        let err = col
            .find_one(&Filter::new().eq("tenant_id", "t1").eq("id", "nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_with_empty_filter_is_validation_error() {
        let col = collection();
        let widget = Widget {
            id: "w1".into(),
            tenant_id: "t1".into(),
            name: "gear".into(),
        };
        let err = col.update(&Filter::new(), &widget).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_REQUIRED_FIELDS");
    }
}
