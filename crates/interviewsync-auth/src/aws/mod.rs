//! AWS backends for the secret store (SSM Parameter Store) and the user
//! store (DynamoDB).

mod dynamo;
mod ssm;

pub use dynamo::{DynamoUserStore, USER_KEY_ATTRIBUTE};
pub use ssm::SsmSecretStore;

/// Loads the shared AWS configuration from the environment.
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}
