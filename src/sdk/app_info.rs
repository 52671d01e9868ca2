use serde::Deserialize;
use tracing::info;

/// Response of the SDK's `/api/v1/app/info` endpoint.
///
/// Only the slug and name are required. Release details are logged as the
/// SDK reports them and never parsed further.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppInfo {
    pub(crate) app_slug: String,
    pub(crate) app_name: String,
    #[serde(default)]
    pub(crate) app_status: Option<String>,
    #[serde(default, rename = "helmChartURL")]
    pub(crate) helm_chart_url: Option<String>,
    #[serde(default)]
    pub(crate) current_release: Option<Release>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Release {
    #[serde(default)]
    pub(crate) version_label: Option<String>,
    #[serde(default)]
    pub(crate) deployed_at: Option<String>,
    #[serde(default)]
    pub(crate) helm_release_name: Option<String>,
    #[serde(default)]
    pub(crate) helm_release_revision: Option<i64>,
    #[serde(default)]
    pub(crate) helm_release_namespace: Option<String>,
}

impl AppInfo {
    pub(crate) fn log(&self) {
        match &self.current_release {
            Some(release) => info!(
                app = %self,
                status = self.app_status.as_deref().unwrap_or("unknown"),
                helm_chart_url = self.helm_chart_url.as_deref(),
                helm_release = release.helm_release_name.as_deref(),
                helm_release_revision = release.helm_release_revision,
                helm_release_namespace = release.helm_release_namespace.as_deref(),
                deployed_at = release.deployed_at.as_deref().filter(|at| !at.is_empty()),
                "Application details"
            ),
            None => info!(
                app = %self,
                status = self.app_status.as_deref().unwrap_or("unknown"),
                helm_chart_url = self.helm_chart_url.as_deref(),
                "Application details"
            ),
        }
    }
}

impl std::fmt::Display for AppInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.app_name, self.app_slug)?;

        if let Some(version) = self
            .current_release
            .as_ref()
            .and_then(|release| release.version_label.as_deref())
            .filter(|version| !version.is_empty())
        {
            write!(f, " release {version}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_INFO_JSON: &str = r#"{
      "appSlug": "slackernews-mackerel",
      "appName": "SlackerNews",
      "appStatus": "unavailable",
      "helmChartURL": "oci://registry.shortrib.io/slackernews-mackerel/stable/slackernews",
      "currentRelease": {
        "versionLabel": "1.1.0-rc.2",
        "releaseNotes": "",
        "createdAt": "2024-05-13T15:23:45Z",
        "deployedAt": "2024-05-30T14:51:14-04:00",
        "helmReleaseName": "slackernews",
        "helmReleaseRevision": 2,
        "helmReleaseNamespace": "slackernews-demo"
      }
    }"#;

    #[test]
    fn deserializes_app_info() {
        let info: AppInfo = serde_json::from_str(APP_INFO_JSON).unwrap();

        assert_eq!(info.app_slug, "slackernews-mackerel");
        assert_eq!(info.app_name, "SlackerNews");
        assert_eq!(info.app_status.as_deref(), Some("unavailable"));
        assert_eq!(
            info.helm_chart_url.as_deref(),
            Some("oci://registry.shortrib.io/slackernews-mackerel/stable/slackernews")
        );

        let release = info.current_release.as_ref().unwrap();
        assert_eq!(release.version_label.as_deref(), Some("1.1.0-rc.2"));
        assert_eq!(release.helm_release_revision, Some(2));
        assert_eq!(
            release.deployed_at.as_deref(),
            Some("2024-05-30T14:51:14-04:00")
        );

        assert_eq!(
            info.to_string(),
            "SlackerNews (slackernews-mackerel) release 1.1.0-rc.2"
        );
    }

    #[test]
    fn tolerates_minimal_app_info() {
        let info: AppInfo =
            serde_json::from_str(r#"{"appSlug": "app", "appName": "App"}"#).unwrap();

        assert!(info.current_release.is_none());
        assert_eq!(info.to_string(), "App (app)");
    }

    #[test]
    fn tolerates_empty_deployed_at() {
        let info: AppInfo = serde_json::from_str(
            r#"{"appSlug":"a","appName":"A","currentRelease":{"versionLabel":"1","deployedAt":""}}"#,
        )
        .unwrap();

        let release = info.current_release.as_ref().unwrap();
        assert_eq!(release.deployed_at.as_deref(), Some(""));
        assert_eq!(info.to_string(), "A (a) release 1");
        info.log();
    }

    #[test]
    fn tolerates_release_without_version_or_deploy_time() {
        let info: AppInfo = serde_json::from_str(
            r#"{"appSlug":"a","appName":"A","currentRelease":{"helmReleaseName":"a"}}"#,
        )
        .unwrap();

        let release = info.current_release.as_ref().unwrap();
        assert!(release.version_label.is_none());
        assert!(release.deployed_at.is_none());
        assert_eq!(info.to_string(), "A (a)");
    }
}
