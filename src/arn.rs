//! ARN derivation for CloudFormation resource types.
//!
//! Each supported type maps to either a template over the physical resource
//! id, or a marker saying the ARN has to be fetched from the owning service.

use std::fmt;

/// Account-level values every template needs. Resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl ArnContext {
    pub fn new(region: &str, account_id: &str, partition: Option<&str>) -> Self {
        Self {
            partition: partition
                .map(str::to_string)
                .unwrap_or_else(|| partition_for_region(region).to_string()),
            region: region.to_string(),
            account_id: account_id.to_string(),
        }
    }

    fn regional(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account_id, resource
        )
    }

    fn global(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}::{}:{}",
            self.partition, service, self.account_id, resource
        )
    }
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Resource types whose ARN embeds something the physical id does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveLookup {
    LambdaFunction,
    DynamoDbTable,
    AppRegistryApplication,
    AppRegistryAttributeGroup,
}

impl fmt::Display for LiveLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LiveLookup::LambdaFunction => "lambda:GetFunction",
            LiveLookup::DynamoDbTable => "dynamodb:DescribeTable",
            LiveLookup::AppRegistryApplication => "servicecatalog:GetApplication",
            LiveLookup::AppRegistryAttributeGroup => "servicecatalog:GetAttributeGroup",
        };
        f.write_str(name)
    }
}

pub type ArnTemplate = fn(&ArnContext, &str) -> String;

#[derive(Clone, Copy)]
pub enum ArnStrategy {
    Template(ArnTemplate),
    Lookup(LiveLookup),
}

impl fmt::Debug for ArnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArnStrategy::Template(_) => f.write_str("Template"),
            ArnStrategy::Lookup(lookup) => write!(f, "Lookup({lookup})"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceRule {
    pub type_prefix: &'static str,
    pub strategy: ArnStrategy,
}

const fn template(type_prefix: &'static str, f: ArnTemplate) -> ResourceRule {
    ResourceRule {
        type_prefix,
        strategy: ArnStrategy::Template(f),
    }
}

const fn lookup(type_prefix: &'static str, lookup: LiveLookup) -> ResourceRule {
    ResourceRule {
        type_prefix,
        strategy: ArnStrategy::Lookup(lookup),
    }
}

/// Supported types, matched by prefix in order.
pub const RESOURCE_RULES: &[ResourceRule] = &[
    template("AWS::IAM::Role", |ctx, id| ctx.global("iam", &format!("role/{id}"))),
    template("AWS::IAM::Policy", |ctx, id| ctx.global("iam", &format!("policy/{id}"))),
    template("AWS::IAM::User", |ctx, id| ctx.global("iam", &format!("user/{id}"))),
    lookup("AWS::Lambda::Function", LiveLookup::LambdaFunction),
    template("AWS::SNS::Topic", |ctx, id| ctx.regional("sns", id)),
    template("AWS::SSM::Parameter", |ctx, id| {
        ctx.regional("ssm", &format!("parameter/{}", id.trim_start_matches('/')))
    }),
    template("AWS::SSM::Document", |ctx, id| ctx.regional("ssm", &format!("document/{id}"))),
    template("AWS::Events::Rule", |ctx, id| ctx.regional("events", &format!("rule/{id}"))),
    template("AWS::Logs::LogGroup", |ctx, id| ctx.regional("logs", &format!("log-group:{id}"))),
    template("AWS::CloudWatch::Alarm", |ctx, id| ctx.regional("cloudwatch", &format!("alarm:{id}"))),
    template("AWS::CloudWatch::Dashboard", |ctx, id| {
        ctx.global("cloudwatch", &format!("dashboard/{id}"))
    }),
    lookup("AWS::DynamoDB::Table", LiveLookup::DynamoDbTable),
    template("AWS::KMS::Key", |ctx, id| ctx.regional("kms", &format!("key/{id}"))),
    // Alias physical ids already carry the `alias/` prefix.
    template("AWS::KMS::Alias", |ctx, id| ctx.regional("kms", id)),
    lookup(
        "AWS::ServiceCatalogAppRegistry::AttributeGroup",
        LiveLookup::AppRegistryAttributeGroup,
    ),
    lookup(
        "AWS::ServiceCatalogAppRegistry::Application",
        LiveLookup::AppRegistryApplication,
    ),
];

pub fn find_rule(resource_type: &str) -> Option<&'static ResourceRule> {
    RESOURCE_RULES
        .iter()
        .find(|rule| resource_type.starts_with(rule.type_prefix))
}

/// Render a template ARN. Ids that already are ARNs pass through unchanged.
pub fn render_template(template: ArnTemplate, ctx: &ArnContext, resource_id: &str) -> String {
    if resource_id.starts_with("arn:") {
        resource_id.to_string()
    } else {
        template(ctx, resource_id)
    }
}

/// Lower-cased service segment of a type, e.g. `iam` for `AWS::IAM::Role`.
pub fn service_name(resource_type: &str) -> Option<String> {
    resource_type
        .split("::")
        .nth(1)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
