//! DynamoDB interview sink.

use std::collections::HashMap;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use interviewsync_core::{BoxFuture, InterviewDraft};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CalendarError, CalendarResult};
use crate::sink::InterviewSink;

/// Writes interviews to a DynamoDB table keyed by a generated `id`.
#[derive(Debug, Clone)]
pub struct DynamoInterviewSink {
    client: Client,
    table: String,
}

impl DynamoInterviewSink {
    /// Wraps a DynamoDB client for `table`.
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Builds a client from shared AWS configuration.
    pub fn from_conf(config: &aws_config::SdkConfig, table: impl Into<String>) -> Self {
        Self::new(Client::new(config), table)
    }

    async fn do_create(&self, draft: &InterviewDraft) -> CalendarResult<String> {
        let id = Uuid::new_v4().to_string();
        let item = interview_item(&id, draft)?;

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| {
                CalendarError::sink(format!(
                    "put into {} failed: {}",
                    self.table,
                    DisplayErrorContext(&err)
                ))
            })?;

        debug!(id = %id, owner = %draft.user_email, "created interview");
        Ok(id)
    }

    async fn do_delete(&self, id: &str) -> CalendarResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|err| {
                CalendarError::sink(format!(
                    "delete from {} failed: {}",
                    self.table,
                    DisplayErrorContext(&err)
                ))
            })?;

        debug!(id = %id, "deleted interview");
        Ok(())
    }
}

impl InterviewSink for DynamoInterviewSink {
    fn create<'a>(&'a self, draft: &'a InterviewDraft) -> BoxFuture<'a, CalendarResult<String>> {
        Box::pin(self.do_create(draft))
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, CalendarResult<()>> {
        Box::pin(self.do_delete(id))
    }
}

/// Interviewers are stored as a JSON string attribute.
fn interview_item(
    id: &str,
    draft: &InterviewDraft,
) -> CalendarResult<HashMap<String, AttributeValue>> {
    let interviewers = serde_json::to_string(&draft.interviewers)
        .map_err(|e| CalendarError::sink(format!("failed to encode interviewers: {}", e)))?;

    let mut item = HashMap::new();
    let mut put = |key: &str, value: &str| {
        item.insert(key.to_string(), AttributeValue::S(value.to_string()));
    };
    put("id", id);
    put("company", &draft.company);
    put("role", &draft.role);
    put("date", &draft.date);
    put("type", &draft.kind);
    put("status", &draft.status);
    put("interviewers", &interviewers);
    put("userEmail", &draft.user_email);
    Ok(item)
}
