use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_types::region::Region;

/// Load the shared SDK config. An explicit region wins over the default
/// provider chain; a profile, if given, selects the named credentials profile.
pub async fn configure_aws(region: Option<String>, profile: Option<String>) -> aws_types::SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(Region::new)).or_default_provider();

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}
