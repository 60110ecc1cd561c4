use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::ports::RowWriter;
use crate::domain::row::RowMap;
use crate::domain::value_objects::{Schema, TableName};

pub const CONTACTS_TABLE: &str = "contacts";

/// One contact-form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: String,
}

impl ContactMessage {
    fn to_row(&self) -> RowMap {
        [
            ("name".to_string(), json!(self.name)),
            ("email".to_string(), json!(self.email)),
            ("phone".to_string(), json!(self.phone)),
            ("description".to_string(), json!(self.description)),
        ]
        .into_iter()
        .collect()
    }
}

/// Fire-and-forget contact submissions: one insert, no retained state.
pub struct ContactService {
    schema: Schema,
    writer: Arc<dyn RowWriter>,
}

impl ContactService {
    pub fn new(schema: Schema, writer: Arc<dyn RowWriter>) -> Self {
        Self { schema, writer }
    }

    pub async fn submit(&self, message: &ContactMessage) -> Result<()> {
        let table = TableName(CONTACTS_TABLE.to_string());
        self.writer
            .insert_row(&self.schema, &table, &message.to_row())
            .await
            .context("Failed to store contact message")?;
        info!(email = %message.email, "contact message stored");
        Ok(())
    }
}
