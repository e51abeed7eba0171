use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use interviewsync_core::{BoxFuture, Identity, UserRecord};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::user_store::UserStore;

/// Partition key of the users table.
pub const USER_KEY_ATTRIBUTE: &str = "email";

type Item = HashMap<String, AttributeValue>;

/// User store backed by a DynamoDB table keyed by `email`.
#[derive(Debug, Clone)]
pub struct DynamoUserStore {
    client: Client,
    table: String,
}

impl DynamoUserStore {
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

    async fn do_get(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(USER_KEY_ATTRIBUTE, AttributeValue::S(email.to_string()))
            .send()
            .await
            .map_err(|err| {
                AuthError::access(format!(
                    "failed to read user {}: {}",
                    email,
                    DisplayErrorContext(&err)
                ))
            })?;

        Ok(output.item().and_then(record_from_item))
    }

    async fn do_update(
        &self,
        email: &str,
        updates: &BTreeMap<String, String>,
        must_exist: bool,
    ) -> AuthResult<()> {
        if updates.is_empty() {
            if must_exist && self.do_get(email).await?.is_none() {
                return Err(AuthError::not_found(format!("user {}", email)));
            }
            return Ok(());
        }

        let set = SetExpression::new(updates);
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(USER_KEY_ATTRIBUTE, AttributeValue::S(email.to_string()))
            .update_expression(set.expression)
            .set_expression_attribute_values(Some(set.values));

        let mut names = set.names;
        if must_exist {
            names.insert("#pk".to_string(), USER_KEY_ATTRIBUTE.to_string());
            request = request.condition_expression("attribute_exists(#pk)");
        }

        request
            .set_expression_attribute_names(Some(names))
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception())
                {
                    AuthError::not_found(format!("user {}", email))
                } else {
                    AuthError::access(format!(
                        "failed to update user {}: {}",
                        email,
                        DisplayErrorContext(&err)
                    ))
                }
            })?;

        debug!(email, fields = updates.len(), "updated user record");
        Ok(())
    }

    async fn do_scan(&self) -> AuthResult<Vec<UserRecord>> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| {
                    AuthError::access(format!(
                        "failed to scan {}: {}",
                        self.table,
                        DisplayErrorContext(&err)
                    ))
                })?;

            records.extend(output.items().iter().filter_map(record_from_item));

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(table = %self.table, users = records.len(), "scanned users");
        Ok(records)
    }
}

impl UserStore for DynamoUserStore {
    fn get<'a>(&'a self, email: &'a str) -> BoxFuture<'a, AuthResult<Option<UserRecord>>> {
        Box::pin(self.do_get(email))
    }

    fn update<'a>(
        &'a self,
        email: &'a str,
        updates: BTreeMap<String, String>,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move { self.do_update(email, &updates, true).await })
    }

    fn upsert_profile<'a>(
        &'a self,
        identity: &'a Identity,
        last_login: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let updates = UserRecord::profile_updates(identity, last_login);
            self.do_update(&identity.email, &updates, false).await
        })
    }

    fn scan(&self) -> BoxFuture<'_, AuthResult<Vec<UserRecord>>> {
        Box::pin(self.do_scan())
    }
}

/// Converts an item to a record, keeping string attributes only.
fn record_from_item(item: &Item) -> Option<UserRecord> {
    let email = item.get(USER_KEY_ATTRIBUTE)?.as_s().ok()?;
    let attributes = item
        .iter()
        .filter(|(key, _)| key.as_str() != USER_KEY_ATTRIBUTE)
        .filter_map(|(key, value)| Some((key.clone(), value.as_s().ok()?.clone())))
        .collect();
    Some(UserRecord {
        email: email.clone(),
        attributes,
    })
}

/// A `SET` update expression with placeholder names and values, so that
/// attribute names never collide with reserved words.
struct SetExpression {
    expression: String,
    names: HashMap<String, String>,
    values: Item,
}

impl SetExpression {
    fn new(updates: &BTreeMap<String, String>) -> Self {
        let mut clauses = Vec::with_capacity(updates.len());
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        for (i, (field, value)) in updates.iter().enumerate() {
            names.insert(format!("#f{}", i), field.clone());
            values.insert(format!(":v{}", i), AttributeValue::S(value.clone()));
            clauses.push(format!("#f{} = :v{}", i, i));
        }

        Self {
            expression: format!("SET {}", clauses.join(", ")),
            names,
            values,
        }
    }
}
