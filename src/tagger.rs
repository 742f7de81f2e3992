//! Tag every resource of a CloudFormation stack.
//!
//! Enumerate the stack, resolve each resource to an ARN, tag it, and fold the
//! outcomes into a report. A failing resource never stops the run.

use crate::arn::{find_rule, render_template, service_name, ArnContext, ArnStrategy};
use crate::cloud::{StackApi, StackResource};
use crate::config::TaggerConfig;
use crate::error::{TaggerError, TaggerResult};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedReason {
    UnsupportedType,
    ArnLookupFailed(String),
    TaggingUnsupported,
    TaggingFailed(String),
}

impl fmt::Display for UntaggedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UntaggedReason::UnsupportedType => f.write_str("unsupported resource type"),
            UntaggedReason::ArnLookupFailed(msg) => write!(f, "ARN could not be fetched: {msg}"),
            UntaggedReason::TaggingUnsupported => f.write_str("resource does not support tagging"),
            UntaggedReason::TaggingFailed(msg) => write!(f, "tagging failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOutcome {
    pub resource_id: String,
    pub resource_type: String,
    pub reason: Option<UntaggedReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    pub tagged: Vec<ResourceOutcome>,
    pub untagged: Vec<ResourceOutcome>,
    /// Lower-cased service names of every resource seen.
    pub services: BTreeSet<String>,
}

impl TagReport {
    fn record(&mut self, resource_id: &str, resource_type: &str, result: Result<(), UntaggedReason>) {
        let outcome = |reason: Option<UntaggedReason>| ResourceOutcome {
            resource_id: resource_id.to_string(),
            resource_type: resource_type.to_string(),
            reason,
        };
        match result {
            Ok(()) => self.tagged.push(outcome(None)),
            Err(reason) => self.untagged.push(outcome(Some(reason))),
        }
    }
}

impl fmt::Display for TagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resources that were successfully tagged:")?;
        for tagged in &self.tagged {
            writeln!(
                f,
                "- Resource ID: {}, Type: {}",
                tagged.resource_id, tagged.resource_type
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Resources that were not tagged:")?;
        for untagged in &self.untagged {
            write!(
                f,
                "- Resource ID: {}, Type: {}",
                untagged.resource_id, untagged.resource_type
            )?;
            match &untagged.reason {
                Some(reason) => writeln!(f, " ({reason})")?,
                None => writeln!(f)?,
            }
        }

        writeln!(f)?;
        writeln!(f, "Set of resource types (lowercased):")?;
        let services: Vec<&str> = self.services.iter().map(String::as_str).collect();
        write!(f, "{}", services.join(", "))
    }
}

pub struct StackTagger<'a, A: StackApi> {
    api: &'a A,
    config: &'a TaggerConfig,
}

impl<'a, A: StackApi + Sync> StackTagger<'a, A> {
    pub fn new(api: &'a A, config: &'a TaggerConfig) -> Self {
        Self { api, config }
    }

    pub async fn enumerate(&self) -> Vec<StackResource> {
        match self.api.describe_stack_resources(&self.config.stack_name).await {
            Ok(resources) => resources,
            Err(e) => {
                error!("Error fetching stack resources: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn resolve_arn(
        &self,
        ctx: &ArnContext,
        resource_id: &str,
        resource_type: &str,
    ) -> Result<String, UntaggedReason> {
        let Some(rule) = find_rule(resource_type) else {
            warn!("Unsupported or unknown resource type: {}", resource_type);
            return Err(UntaggedReason::UnsupportedType);
        };

        match rule.strategy {
            ArnStrategy::Template(template) => Ok(render_template(template, ctx, resource_id)),
            ArnStrategy::Lookup(lookup) => {
                self.api.lookup_arn(lookup, resource_id).await.map_err(|e| {
                    warn!("{}", e);
                    UntaggedReason::ArnLookupFailed(e.to_string())
                })
            }
        }
    }

    async fn tag(&self, arn: &str) -> Result<(), UntaggedReason> {
        match self.api.tag_resource(arn, &self.config.tags).await {
            Ok(()) => {
                info!("Tagged {}", arn);
                Ok(())
            }
            Err(e @ TaggerError::TaggingUnsupported { .. }) => {
                warn!("{}", e);
                Err(UntaggedReason::TaggingUnsupported)
            }
            Err(e) => {
                warn!("{}", e);
                Err(UntaggedReason::TaggingFailed(e.to_string()))
            }
        }
    }

    /// `None` when the stack has no resources. Only resolving the account
    /// context fails the run; per-resource problems land in `untagged`.
    pub async fn run(&self) -> TaggerResult<Option<TagReport>> {
        let resources = self.enumerate().await;
        if resources.is_empty() {
            return Ok(None);
        }

        let mut report = TagReport::default();

        let ctx = self.api.arn_context(self.config.partition.as_deref()).await?;
        info!(
            "Tagging {} resource(s) of stack {} in {} ({})",
            resources.len(),
            self.config.stack_name,
            ctx.region,
            ctx.account_id
        );

        for resource in &resources {
            let resource_type = resource.resource_type.as_deref().unwrap_or_default();
            if let Some(service) = service_name(resource_type) {
                report.services.insert(service);
            }

            let Some(resource_id) = resource.physical_id.as_deref().filter(|id| !id.is_empty())
            else {
                continue;
            };

            info!("Processing resource: {} of type {}", resource_id, resource_type);
            let result = match self.resolve_arn(&ctx, resource_id, resource_type).await {
                Ok(arn) => self.tag(&arn).await,
                Err(reason) => {
                    warn!(
                        "Resource type does not support tagging or ARN could not be fetched: {}",
                        resource_type
                    );
                    Err(reason)
                }
            };
            report.record(resource_id, resource_type, result);
        }

        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arn::LiveLookup;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStackApi {
        resources: Option<Vec<StackResource>>,
        lookups: HashMap<String, String>,
        unsupported_arns: Vec<String>,
        failing_arns: Vec<String>,
        context_error: bool,
        tagged: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    }

    #[async_trait]
    impl StackApi for FakeStackApi {
        async fn describe_stack_resources(&self, stack_name: &str) -> TaggerResult<Vec<StackResource>> {
            self.resources
                .clone()
                .ok_or_else(|| TaggerError::aws(format!("Stack with id {stack_name} does not exist")))
        }

        async fn arn_context(&self, partition: Option<&str>) -> TaggerResult<ArnContext> {
            if self.context_error {
                return Err(TaggerError::aws("STS GetCallerIdentity failed: ExpiredToken"));
            }
            Ok(ArnContext::new("us-east-1", "111122223333", partition))
        }

        async fn lookup_arn(&self, lookup: LiveLookup, resource_id: &str) -> TaggerResult<String> {
            self.lookups
                .get(resource_id)
                .cloned()
                .ok_or_else(|| TaggerError::arn_lookup(resource_id, format!("{lookup} not found")))
        }

        async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> TaggerResult<()> {
            if self.unsupported_arns.iter().any(|a| a == arn) {
                return Err(TaggerError::TaggingUnsupported { arn: arn.to_string() });
            }
            if self.failing_arns.iter().any(|a| a == arn) {
                return Err(TaggerError::TagRejected {
                    arn: arn.to_string(),
                    message: "ThrottlingException".to_string(),
                });
            }
            self.tagged
                .lock()
                .unwrap()
                .push((arn.to_string(), tags.clone()));
            Ok(())
        }
    }

    fn ids(outcomes: &[ResourceOutcome]) -> BTreeSet<&str> {
        outcomes.iter().map(|o| o.resource_id.as_str()).collect()
    }

    #[tokio::test]
    async fn tags_supported_resources_with_configured_tags() {
        let api = FakeStackApi {
            resources: Some(vec![
                StackResource::new("scheduler-role", "AWS::IAM::Role"),
                StackResource::new("scheduler-fn", "AWS::Lambda::Function"),
                StackResource::new("/aws/lambda/scheduler-fn", "AWS::Logs::LogGroup"),
            ]),
            lookups: HashMap::from([(
                "scheduler-fn".to_string(),
                "arn:aws:lambda:us-east-1:111122223333:function:scheduler-fn".to_string(),
            )]),
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let report = StackTagger::new(&api, &config).run().await.unwrap().unwrap();

        assert_eq!(
            ids(&report.tagged),
            BTreeSet::from(["scheduler-role", "scheduler-fn", "/aws/lambda/scheduler-fn"])
        );
        assert!(report.untagged.is_empty());
        assert_eq!(
            report.services,
            BTreeSet::from(["iam".to_string(), "lambda".to_string(), "logs".to_string()])
        );

        let tagged = api.tagged.lock().unwrap();
        let arns: BTreeSet<&str> = tagged.iter().map(|(arn, _)| arn.as_str()).collect();
        assert!(arns.contains("arn:aws:iam::111122223333:role/scheduler-role"));
        assert!(arns.contains("arn:aws:lambda:us-east-1:111122223333:function:scheduler-fn"));
        assert!(tagged.iter().all(|(_, tags)| tags == &config.tags));
    }

    #[tokio::test]
    async fn unsupported_type_is_never_tagged() {
        let api = FakeStackApi {
            resources: Some(vec![
                StackResource::new("i-0abc", "AWS::EC2::Instance"),
                StackResource::new("alerts", "AWS::SNS::Topic"),
            ]),
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let report = StackTagger::new(&api, &config).run().await.unwrap().unwrap();

        assert_eq!(ids(&report.untagged), BTreeSet::from(["i-0abc"]));
        assert_eq!(report.untagged[0].reason, Some(UntaggedReason::UnsupportedType));
        assert_eq!(ids(&report.tagged), BTreeSet::from(["alerts"]));
        assert!(report.services.contains("ec2"));
    }

    #[tokio::test]
    async fn invalid_parameter_rejection_does_not_stop_the_batch() {
        let api = FakeStackApi {
            resources: Some(vec![
                StackResource::new("ops", "AWS::CloudWatch::Dashboard"),
                StackResource::new("cpu-high", "AWS::CloudWatch::Alarm"),
                StackResource::new("nightly", "AWS::Events::Rule"),
            ]),
            unsupported_arns: vec!["arn:aws:cloudwatch::111122223333:dashboard/ops".to_string()],
            failing_arns: vec!["arn:aws:events:us-east-1:111122223333:rule/nightly".to_string()],
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let report = StackTagger::new(&api, &config).run().await.unwrap().unwrap();

        assert_eq!(ids(&report.tagged), BTreeSet::from(["cpu-high"]));
        assert_eq!(ids(&report.untagged), BTreeSet::from(["ops", "nightly"]));
        let dashboard = report.untagged.iter().find(|o| o.resource_id == "ops").unwrap();
        assert_eq!(dashboard.reason, Some(UntaggedReason::TaggingUnsupported));
    }

    #[tokio::test]
    async fn failed_lookup_lands_in_untagged() {
        let api = FakeStackApi {
            resources: Some(vec![
                StackResource::new("gone-table", "AWS::DynamoDB::Table"),
                StackResource::new("key-id", "AWS::KMS::Key"),
            ]),
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let report = StackTagger::new(&api, &config).run().await.unwrap().unwrap();

        assert_eq!(ids(&report.untagged), BTreeSet::from(["gone-table"]));
        assert!(matches!(
            report.untagged[0].reason,
            Some(UntaggedReason::ArnLookupFailed(_))
        ));
        assert_eq!(ids(&report.tagged), BTreeSet::from(["key-id"]));
    }

    #[tokio::test]
    async fn describe_failure_yields_no_report() {
        let api = FakeStackApi::default();
        let config = TaggerConfig::default();

        assert_eq!(StackTagger::new(&api, &config).run().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_stack_yields_no_report() {
        let api = FakeStackApi {
            resources: Some(Vec::new()),
            ..Default::default()
        };
        let config = TaggerConfig::default();

        assert_eq!(StackTagger::new(&api, &config).run().await.unwrap(), None);
    }

    #[tokio::test]
    async fn account_context_failure_aborts_the_run() {
        let api = FakeStackApi {
            resources: Some(vec![StackResource::new("scheduler-role", "AWS::IAM::Role")]),
            context_error: true,
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let err = StackTagger::new(&api, &config).run().await.unwrap_err();
        assert!(matches!(err, TaggerError::Aws(_)));
        assert!(api.tagged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resources_without_physical_id_are_skipped() {
        let api = FakeStackApi {
            resources: Some(vec![StackResource {
                physical_id: None,
                resource_type: Some("AWS::SSM::Parameter".to_string()),
            }]),
            ..Default::default()
        };
        let config = TaggerConfig::default();

        let report = StackTagger::new(&api, &config).run().await.unwrap().unwrap();
        assert!(report.tagged.is_empty());
        assert!(report.untagged.is_empty());
        assert_eq!(report.services, BTreeSet::from(["ssm".to_string()]));
        assert!(report.to_string().ends_with("Set of resource types (lowercased):\nssm"));
    }

    #[test]
    fn report_lists_both_buckets_and_services() {
        let mut report = TagReport::default();
        report.record("role", "AWS::IAM::Role", Ok(()));
        report.record("i-1", "AWS::EC2::Instance", Err(UntaggedReason::UnsupportedType));
        report.services.insert("iam".into());
        report.services.insert("ec2".into());

        let text = report.to_string();
        assert!(text.contains("- Resource ID: role, Type: AWS::IAM::Role\n"));
        assert!(text.contains("- Resource ID: i-1, Type: AWS::EC2::Instance (unsupported resource type)"));
        assert!(text.ends_with("ec2, iam"));
    }
}
