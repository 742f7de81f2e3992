//! AWS calls made by the stack tagger, behind the `StackApi` trait so the
//! tagging run can be driven without an account.

use crate::arn::{ArnContext, LiveLookup};
use crate::error::{TaggerError, TaggerResult};
use async_trait::async_trait;
use aws_sdk_cloudformation::Client as CfnClient;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_resourcegroupstagging::Client as TaggingClient;
use aws_sdk_servicecatalogappregistry::Client as AppRegistryClient;
use aws_sdk_sts::Client as StsClient;
use std::collections::BTreeMap;
use tracing::debug;

/// The parts of a CloudFormation stack resource the tagger uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResource {
    pub physical_id: Option<String>,
    pub resource_type: Option<String>,
}

impl StackResource {
    pub fn new(physical_id: &str, resource_type: &str) -> Self {
        Self {
            physical_id: Some(physical_id.to_string()),
            resource_type: Some(resource_type.to_string()),
        }
    }
}

#[async_trait]
pub trait StackApi {
    async fn describe_stack_resources(&self, stack_name: &str) -> TaggerResult<Vec<StackResource>>;

    /// Region, account and partition for ARN templates.
    async fn arn_context(&self, partition: Option<&str>) -> TaggerResult<ArnContext>;

    async fn lookup_arn(&self, lookup: LiveLookup, resource_id: &str) -> TaggerResult<String>;

    /// Apply `tags` to a single ARN.
    ///
    /// `TaggingUnsupported` when the tagging API rejects the ARN as an invalid
    /// parameter, `TagRejected` for everything else.
    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> TaggerResult<()>;
}

pub struct AwsStackApi {
    region: Option<String>,
    cloudformation: CfnClient,
    sts: StsClient,
    lambda: LambdaClient,
    dynamodb: DynamoDbClient,
    appregistry: AppRegistryClient,
    tagging: TaggingClient,
}

impl AwsStackApi {
    pub fn new(config: &aws_types::SdkConfig) -> Self {
        Self {
            region: config.region().map(|r| r.to_string()),
            cloudformation: CfnClient::new(config),
            sts: StsClient::new(config),
            lambda: LambdaClient::new(config),
            dynamodb: DynamoDbClient::new(config),
            appregistry: AppRegistryClient::new(config),
            tagging: TaggingClient::new(config),
        }
    }

    async fn caller_account_id(&self) -> TaggerResult<String> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| {
                TaggerError::aws(format!(
                    "STS GetCallerIdentity failed: {}",
                    aws_sdk_sts::error::DisplayErrorContext(&e)
                ))
            })?;
        out.account()
            .map(str::to_string)
            .ok_or_else(|| TaggerError::aws("STS GetCallerIdentity missing Account"))
    }

    async fn lambda_function_arn(&self, resource_id: &str) -> Result<Option<String>, String> {
        let out = self
            .lambda
            .get_function()
            .function_name(resource_id)
            .send()
            .await
            .map_err(|e| aws_sdk_lambda::error::DisplayErrorContext(&e).to_string())?;
        Ok(out
            .configuration()
            .and_then(|c| c.function_arn())
            .map(str::to_string))
    }

    async fn dynamodb_table_arn(&self, resource_id: &str) -> Result<Option<String>, String> {
        let out = self
            .dynamodb
            .describe_table()
            .table_name(resource_id)
            .send()
            .await
            .map_err(|e| aws_sdk_dynamodb::error::DisplayErrorContext(&e).to_string())?;
        Ok(out.table().and_then(|t| t.table_arn()).map(str::to_string))
    }

    async fn application_arn(&self, resource_id: &str) -> Result<Option<String>, String> {
        let out = self
            .appregistry
            .get_application()
            .application(resource_id)
            .send()
            .await
            .map_err(|e| aws_sdk_servicecatalogappregistry::error::DisplayErrorContext(&e).to_string())?;
        Ok(out.arn().map(str::to_string))
    }

    async fn attribute_group_arn(&self, resource_id: &str) -> Result<Option<String>, String> {
        let out = self
            .appregistry
            .get_attribute_group()
            .attribute_group(resource_id)
            .send()
            .await
            .map_err(|e| aws_sdk_servicecatalogappregistry::error::DisplayErrorContext(&e).to_string())?;
        Ok(out.arn().map(str::to_string))
    }
}

#[async_trait]
impl StackApi for AwsStackApi {
    async fn describe_stack_resources(&self, stack_name: &str) -> TaggerResult<Vec<StackResource>> {
        debug!("DescribeStackResources {}", stack_name);
        let resp = self
            .cloudformation
            .describe_stack_resources()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                TaggerError::aws(format!(
                    "{}",
                    aws_sdk_cloudformation::error::DisplayErrorContext(&e)
                ))
            })?;

        let resources = resp
            .stack_resources()
            .iter()
            .map(|res| StackResource {
                physical_id: res.physical_resource_id().map(str::to_string),
                resource_type: res.resource_type().map(str::to_string),
            })
            .collect();

        Ok(resources)
    }

    async fn arn_context(&self, partition: Option<&str>) -> TaggerResult<ArnContext> {
        let region = self
            .region
            .as_deref()
            .ok_or_else(|| TaggerError::config("no AWS region configured"))?;
        let account_id = self.caller_account_id().await?;
        Ok(ArnContext::new(region, &account_id, partition))
    }

    async fn lookup_arn(&self, lookup: LiveLookup, resource_id: &str) -> TaggerResult<String> {
        debug!("{} {}", lookup, resource_id);
        let arn = match lookup {
            LiveLookup::LambdaFunction => self.lambda_function_arn(resource_id).await,
            LiveLookup::DynamoDbTable => self.dynamodb_table_arn(resource_id).await,
            LiveLookup::AppRegistryApplication => self.application_arn(resource_id).await,
            LiveLookup::AppRegistryAttributeGroup => self.attribute_group_arn(resource_id).await,
        }
        .map_err(|message| TaggerError::arn_lookup(resource_id, message))?;

        arn.ok_or_else(|| TaggerError::arn_lookup(resource_id, format!("{lookup} returned no ARN")))
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> TaggerResult<()> {
        debug!("TagResources {}", arn);
        let mut request = self.tagging.tag_resources().resource_arn_list(arn);
        for (key, value) in tags {
            request = request.tags(key, value);
        }

        let out = match request.send().await {
            Ok(out) => out,
            Err(e) => {
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_invalid_parameter_exception())
                {
                    return Err(TaggerError::TaggingUnsupported {
                        arn: arn.to_string(),
                    });
                }
                return Err(TaggerError::TagRejected {
                    arn: arn.to_string(),
                    message: aws_sdk_resourcegroupstagging::error::DisplayErrorContext(&e)
                        .to_string(),
                });
            }
        };

        // The call succeeds as a whole even when individual ARNs fail.
        if let Some(failure) = out.failed_resources_map().and_then(|m| m.get(arn)) {
            return Err(TaggerError::TagRejected {
                arn: arn.to_string(),
                message: failure
                    .error_message()
                    .unwrap_or("listed in FailedResourcesMap")
                    .to_string(),
            });
        }

        Ok(())
    }
}
