use std::{path::PathBuf, time::Duration};

use clap::Args;
use url::Url;

use crate::{
    events::PodReference,
    license_enforcement::{DEFAULT_MAX_ELAPSED, ExponentialBackoff},
    sdk::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SDK_ENDPOINT},
};

#[derive(Debug, Args)]
pub(crate) struct GlobalOpts {
    /// Replicated SDK Endpoint
    ///
    /// Base URL of the Replicated SDK service installed alongside the
    /// application.
    #[arg(long, env = "REPLICATED_SDK_ENDPOINT", default_value = DEFAULT_SDK_ENDPOINT)]
    pub(crate) sdk_endpoint: Url,

    /// Timeout for each request to the Replicated SDK (e.g. `30s`, `1m`)
    #[arg(
        long,
        env = "REPLICATED_SDK_REQUEST_TIMEOUT",
        value_parser = humantime::parse_duration,
        default_value = humantime::format_duration(DEFAULT_REQUEST_TIMEOUT).to_string(),
    )]
    pub(crate) request_timeout: Duration,

    /// License Public Key
    ///
    /// PEM file holding the RSA public key license field signatures are
    /// checked against. Defaults to the key built into the enforcer.
    #[arg(long, env = "LICENSE_PUBLIC_KEY_PATH", value_name = "PEM_FILE")]
    pub(crate) license_public_key: Option<PathBuf>,

    /// Name of the pod the enforcer runs in
    ///
    /// License events are recorded against this pod. Usually set from the
    /// Kubernetes downward API.
    #[arg(long, env = "POD_NAME")]
    pub(crate) pod_name: String,

    /// Namespace of the pod the enforcer runs in
    #[arg(long, env = "POD_NAMESPACE")]
    pub(crate) pod_namespace: String,

    /// UID of the pod the enforcer runs in
    #[arg(long, env = "POD_UID")]
    pub(crate) pod_uid: Option<String>,

    /// Give up retrying a failing license check after this long (e.g. `15m`)
    #[arg(
        long,
        env = "LICENSE_CHECK_MAX_RETRY_ELAPSED",
        value_parser = humantime::parse_duration,
        default_value = humantime::format_duration(DEFAULT_MAX_ELAPSED).to_string(),
    )]
    pub(crate) max_retry_elapsed: Duration,
}

impl GlobalOpts {
    pub(crate) fn pod(&self) -> PodReference {
        PodReference {
            name: self.pod_name.clone(),
            namespace: self.pod_namespace.clone(),
            uid: self.pod_uid.clone().filter(|uid| !uid.is_empty()),
        }
    }

    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::default().with_max_elapsed(self.max_retry_elapsed)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        global_opts: GlobalOpts,
    }

    #[test]
    fn defaults() {
        let cli = TestCli::try_parse_from([
            "license-enforcer",
            "--pod-name",
            "enforcer-7d9f",
            "--pod-namespace",
            "slackernews",
        ])
        .unwrap();
        let opts = cli.global_opts;

        assert_eq!(opts.sdk_endpoint.as_str(), "http://replicated:3000/");
        assert_eq!(opts.request_timeout, Duration::from_secs(30));
        assert_eq!(opts.max_retry_elapsed, Duration::from_secs(15 * 60));
        assert!(opts.license_public_key.is_none());
        assert_eq!(
            opts.pod(),
            PodReference {
                name: "enforcer-7d9f".to_owned(),
                namespace: "slackernews".to_owned(),
                uid: None,
            }
        );
    }

    #[test]
    fn parses_durations() {
        let cli = TestCli::try_parse_from([
            "license-enforcer",
            "--pod-name",
            "enforcer-7d9f",
            "--pod-namespace",
            "slackernews",
            "--pod-uid",
            "0b6c2f4e",
            "--request-timeout",
            "5s",
            "--max-retry-elapsed",
            "2m 30s",
        ])
        .unwrap();
        let opts = cli.global_opts;

        assert_eq!(opts.request_timeout, Duration::from_secs(5));
        assert_eq!(opts.backoff().max_elapsed, Duration::from_secs(150));
        assert_eq!(opts.pod().uid.as_deref(), Some("0b6c2f4e"));
    }

    #[test]
    fn rejects_bad_endpoint() {
        let result = TestCli::try_parse_from([
            "license-enforcer",
            "--pod-name",
            "enforcer-7d9f",
            "--pod-namespace",
            "slackernews",
            "--sdk-endpoint",
            "not a url",
        ]);

        assert!(result.is_err());
    }
}
