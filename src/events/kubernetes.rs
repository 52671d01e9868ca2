use anyhow::{Context as _, anyhow};
use k8s_openapi::api::core::v1::Event;
use kube::{
    Api, Client, Config,
    api::{ListParams, PostParams},
    config::KubeConfigOptions,
};
use tracing::{debug, info, instrument};

use super::{EventKey, EventStore, StoreError};

/// Events in the namespace of the pod the enforcer runs in.
#[derive(Clone)]
pub(crate) struct KubernetesEventStore {
    api: Api<Event>,
}

impl KubernetesEventStore {
    pub(crate) async fn connect(namespace: &str) -> anyhow::Result<Self> {
        let config = match Config::incluster_env() {
            Ok(config) => config,
            Err(env_err) => match Config::incluster_dns() {
                Ok(config) => config,
                Err(dns_err) => {
                    debug!(
                        ?env_err,
                        ?dns_err,
                        "Not running in a cluster, falling back to kubeconfig"
                    );

                    Config::from_kubeconfig(&KubeConfigOptions::default())
                        .await
                        .context("No in-cluster Kubernetes config and failed to load kubeconfig")?
                }
            },
        };

        info!(cluster_url = %config.cluster_url, namespace, "Using Kubernetes cluster");

        let client =
            Client::try_from(config).context("Failed to instantiate Kubernetes client")?;

        Ok(Self::new(client, namespace))
    }

    pub(crate) fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

impl EventStore for KubernetesEventStore {
    #[instrument(level = "debug", skip(self), fields(key = %key))]
    async fn find(&self, key: &EventKey) -> Result<Option<Event>, StoreError> {
        let params = ListParams::default()
            .fields(&key.field_selector())
            .labels(&key.label_selector());

        let events = self
            .api
            .list(&params)
            .await
            .context("Failed to list events")
            .map_err(StoreError::Lookup)?;

        debug!(matches = events.items.len(), "Listed license events");

        Ok(events
            .items
            .into_iter()
            .rev()
            .find(|event| EventKey::from_event(event).as_ref() == Some(key)))
    }

    #[instrument(level = "debug", skip_all)]
    async fn create(&self, event: Event) -> Result<Event, StoreError> {
        self.api
            .create(&PostParams::default(), &event)
            .await
            .context("Failed to create event")
            .map_err(StoreError::Write)
    }

    #[instrument(level = "debug", skip_all, fields(name = event.metadata.name.as_deref()))]
    async fn update(&self, event: Event) -> Result<Event, StoreError> {
        let Some(name) = event.metadata.name.as_deref() else {
            return Err(StoreError::Write(anyhow!("Cannot update an event without a name")));
        };

        self.api
            .replace(name, &PostParams::default(), &event)
            .await
            .with_context(|| format!("Failed to update event {name}"))
            .map_err(StoreError::Write)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use http::{Method, Request, Response, StatusCode};
    use kube::client::Body;
    use serde_json::{Value, json};
    use tower_test::mock::{self, Handle};

    use super::*;
    use crate::events::{PodReference, Validity};

    type MockHandle = Handle<Request<Body>, Response<Body>>;

    fn store() -> (KubernetesEventStore, MockHandle) {
        let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(service, "slackernews");

        (KubernetesEventStore::new(client, "slackernews"), handle)
    }

    fn key() -> EventKey {
        let pod = PodReference {
            name: "enforcer-7d9f".to_owned(),
            namespace: "slackernews".to_owned(),
            uid: None,
        };

        EventKey::new(
            &pod,
            "slackernews",
            Validity::Valid,
            Utc.with_ymd_and_hms(2025, 6, 30, 4, 0, 0).unwrap(),
        )
    }

    fn listed_event(name: &str, pod: &str, reason: &str, count: i32) -> Value {
        json!({
            "metadata": {
                "name": name,
                "namespace": "slackernews",
                "labels": {
                    "replicated.com/application": "slackernews",
                    "replicated.com/expires-at": "2025-06-30"
                }
            },
            "involvedObject": {
                "kind": "Pod",
                "name": pod,
                "namespace": "slackernews"
            },
            "reason": reason,
            "type": "Normal",
            "count": count
        })
    }

    fn respond(status: StatusCode, body: &Value) -> Response<Body> {
        Response::builder()
            .status(status)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn event_list(items: Vec<Value>) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "EventList",
            "metadata": {},
            "items": items
        })
    }

    #[tokio::test]
    async fn find_lists_by_selectors_and_rechecks_key() {
        let (store, mut handle) = store();

        let api_server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("no list request");

            assert_eq!(request.method(), Method::GET);
            assert_eq!(request.uri().path(), "/api/v1/namespaces/slackernews/events");
            let query = request.uri().query().unwrap_or_default();
            assert!(query.contains("fieldSelector="), "{query}");
            assert!(query.contains("labelSelector="), "{query}");

            // The API server is trusted to filter, but the last item does
            // not belong to this pod and must be skipped.
            send.send_response(respond(
                StatusCode::OK,
                &event_list(vec![
                    listed_event("slackernews.first", "enforcer-7d9f", "Valid", 1),
                    listed_event("slackernews.second", "enforcer-7d9f", "Valid", 4),
                    listed_event("slackernews.other", "enforcer-other", "Valid", 9),
                ]),
            ));
        });

        let event = store.find(&key()).await.unwrap().unwrap();
        api_server.await.unwrap();

        assert_eq!(event.metadata.name.as_deref(), Some("slackernews.second"));
        assert_eq!(event.count, Some(4));
    }

    #[tokio::test]
    async fn find_ignores_events_with_other_reasons() {
        let (store, mut handle) = store();

        let api_server = tokio::spawn(async move {
            let (_, send) = handle.next_request().await.expect("no list request");
            send.send_response(respond(
                StatusCode::OK,
                &event_list(vec![listed_event(
                    "slackernews.expired",
                    "enforcer-7d9f",
                    "Expired",
                    1,
                )]),
            ));
        });

        let event = store.find(&key()).await.unwrap();
        api_server.await.unwrap();

        assert!(event.is_none());
    }

    #[tokio::test]
    async fn find_surfaces_api_errors_as_lookup_failures() {
        let (store, mut handle) = store();

        let api_server = tokio::spawn(async move {
            let (_, send) = handle.next_request().await.expect("no list request");
            send.send_response(respond(
                StatusCode::FORBIDDEN,
                &json!({
                    "apiVersion": "v1",
                    "kind": "Status",
                    "status": "Failure",
                    "message": "events is forbidden",
                    "reason": "Forbidden",
                    "code": 403
                }),
            ));
        });

        let result = store.find(&key()).await;
        api_server.await.unwrap();

        assert!(matches!(result, Err(StoreError::Lookup(_))));
    }

    #[tokio::test]
    async fn update_replaces_named_event() {
        let (store, mut handle) = store();

        let api_server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("no replace request");

            assert_eq!(request.method(), Method::PUT);
            assert_eq!(
                request.uri().path(),
                "/api/v1/namespaces/slackernews/events/slackernews.second"
            );

            send.send_response(respond(
                StatusCode::OK,
                &listed_event("slackernews.second", "enforcer-7d9f", "Valid", 5),
            ));
        });

        let event: Event =
            serde_json::from_value(listed_event("slackernews.second", "enforcer-7d9f", "Valid", 5))
                .unwrap();
        let updated = store.update(event).await.unwrap();
        api_server.await.unwrap();

        assert_eq!(updated.count, Some(5));
    }

    #[tokio::test]
    async fn update_requires_event_name() {
        let (store, _handle) = store();

        let mut event: Event =
            serde_json::from_value(listed_event("unused", "enforcer-7d9f", "Valid", 2)).unwrap();
        event.metadata.name = None;

        let Err(StoreError::Write(err)) = store.update(event).await else {
            panic!("expected a write error");
        };

        assert!(err.to_string().contains("without a name"));
    }

    #[tokio::test]
    async fn create_posts_to_pod_namespace() {
        let (store, mut handle) = store();

        let api_server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("no create request");

            assert_eq!(request.method(), Method::POST);
            assert_eq!(request.uri().path(), "/api/v1/namespaces/slackernews/events");

            send.send_response(respond(
                StatusCode::CREATED,
                &listed_event("slackernews.x7k2p", "enforcer-7d9f", "Valid", 1),
            ));
        });

        let mut event: Event =
            serde_json::from_value(listed_event("unused", "enforcer-7d9f", "Valid", 1)).unwrap();
        event.metadata.name = None;
        event.metadata.generate_name = Some("slackernews.".to_owned());

        let created = store.create(event).await.unwrap();
        api_server.await.unwrap();

        assert_eq!(created.metadata.name.as_deref(), Some("slackernews.x7k2p"));
    }
}
