use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;
use interviewsync_core::BoxFuture;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::secret_store::SecretStore;

/// Secret store backed by SSM Parameter Store.
#[derive(Debug, Clone)]
pub struct SsmSecretStore {
    client: Client,
}

impl SsmSecretStore {
    /// Wraps an SSM client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from shared AWS configuration.
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    async fn do_get(&self, name: &str) -> AuthResult<String> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_parameter_not_found())
                {
                    AuthError::not_found(format!("parameter {}", name))
                } else {
                    AuthError::access(format!(
                        "failed to read parameter {}: {}",
                        name,
                        DisplayErrorContext(&err)
                    ))
                }
            })?;

        let value = output
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| AuthError::not_found(format!("parameter {} has no value", name)))?;
        debug!(parameter = name, "read secret parameter");
        Ok(value.to_string())
    }

    async fn do_put(&self, name: &str, value: &str, secure: bool) -> AuthResult<()> {
        let kind = if secure {
            ParameterType::SecureString
        } else {
            ParameterType::String
        };

        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(kind)
            .overwrite(true)
            .send()
            .await
            .map_err(|err| {
                AuthError::access(format!(
                    "failed to write parameter {}: {}",
                    name,
                    DisplayErrorContext(&err)
                ))
            })?;
        debug!(parameter = name, secure, "wrote secret parameter");
        Ok(())
    }
}

impl SecretStore for SsmSecretStore {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, AuthResult<String>> {
        Box::pin(self.do_get(name))
    }

    fn put<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        secure: bool,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(self.do_put(name, value, secure))
    }
}
