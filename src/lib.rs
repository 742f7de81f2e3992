//! Helpers for bringing existing AWS infrastructure under management.
//!
//! - [`plan`]: rename resources in a terraformer import plan after their
//!   `Name` tag (`cook-plan`).
//! - [`tagger`]: tag every resource of a CloudFormation stack through the
//!   Resource Groups Tagging API (`tag-stack`).

pub mod arn;
pub mod aws_config;
pub mod cloud;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod tagger;
