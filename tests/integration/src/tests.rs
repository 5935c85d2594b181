//! Integration tests for the Workspace Reconciler
//!
//! These tests require a running server and are skipped when none answers.
//! Run with: WORKSPACE_TEST_URL=http://127.0.0.1:8080 cargo test

use integration_tests::*;

// ============================================================================
// Health Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };

    let response = config
        .client
        .get(config.api_url("/health"))
        .send()
        .await
        .expect("Failed to send health request");
    assert!(response.status().is_success());

    let health: HealthResponse = response.json().await.expect("Failed to parse health response");
    assert_eq!(health.status, "ok");
}

// ============================================================================
// Workspace Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_get_workspace() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };
    let agent = config.register_agent().await.expect("Failed to register agent");
    assert!(agent.token.is_some());
    assert_eq!(agent.dns_zone, "workspaces.example.com");

    let created = config
        .create_workspace(agent.id)
        .await
        .expect("Failed to create workspace");
    assert_eq!(created.agent_id, agent.id);
    assert_eq!(created.desired_state, "Running");
    assert_eq!(created.actual_state, "CreationRequested");
    assert!(created.namespace.starts_with(&format!("gl-rd-ns-{}-", agent.id)));

    let fetched: WorkspaceResponse = config
        .client
        .get(config.api_url(&format!("/workspaces/{}", created.id)))
        .send()
        .await
        .expect("Failed to get workspace")
        .json()
        .await
        .expect("Failed to parse workspace");
    assert_eq!(fetched.name, created.name);
}

#[tokio::test]
async fn test_create_workspace_rejects_invalid_devfile() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };
    let agent = config.register_agent().await.expect("Failed to register agent");

    let request = CreateWorkspaceRequest {
        agent_id: agent.id,
        name: None,
        processed_devfile: "components: [".to_string(),
        variables: Vec::new(),
    };
    let response = config
        .client
        .post(config.api_url("/workspaces"))
        .json(&request)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let error: ErrorResponse = response.json().await.expect("Failed to parse error");
    assert_eq!(error.code, 2004);
}

// ============================================================================
// Reconcile Tests
// ============================================================================

#[tokio::test]
async fn test_reconcile_without_token_is_rejected() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };

    let response = config
        .client
        .post(config.api_url("/internal/reconcile"))
        .json(&ReconcileRequest::full())
        .send()
        .await
        .expect("Failed to send reconcile request");
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reconcile_lifecycle() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };
    let agent = config.register_agent().await.expect("Failed to register agent");
    let token = agent.token.clone().expect("Registration returns a token");
    let workspace = config
        .create_workspace(agent.id)
        .await
        .expect("Failed to create workspace");

    // First poll: the new workspace arrives with everything, secrets included
    let response = config
        .reconcile(&token, &ReconcileRequest::partial(Vec::new()))
        .await
        .expect("Failed to reconcile");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: ReconcileResponse = response.json().await.expect("Failed to parse response");

    let info = body.find(&workspace.name).expect("Workspace missing from response");
    let config_to_apply = info.config_to_apply.as_ref().expect("Config expected");
    let kinds = kinds(config_to_apply);
    assert_eq!(kinds.first().map(String::as_str), Some("ConfigMap"));
    assert!(kinds.iter().any(|k| k == "Deployment"));
    assert!(kinds.iter().any(|k| k == "NetworkPolicy"));
    assert_eq!(kinds.iter().filter(|k| *k == "Secret").count(), 2);

    // Agent reports the workspace running; nothing changed on our side
    let report = WorkspaceAgentInfo {
        name: workspace.name.clone(),
        namespace: workspace.namespace.clone(),
        actual_state: "Running".to_string(),
        resource_version: Some("7".to_string()),
    };
    let body: ReconcileResponse = config
        .reconcile(&token, &ReconcileRequest::partial(vec![report]))
        .await
        .expect("Failed to reconcile")
        .json()
        .await
        .expect("Failed to parse response");
    let info = body.find(&workspace.name).expect("Reported workspace is answered");
    assert_eq!(info.actual_state, "Running");
    assert_eq!(info.deployment_resource_version.as_deref(), Some("7"));
    assert!(info.config_to_apply.is_none());

    // Stop it: the next poll carries the workloads again, without secrets
    let response = config
        .client
        .put(config.api_url(&format!("/workspaces/{}/desired_state", workspace.id)))
        .json(&UpdateDesiredStateRequest {
            desired_state: "Stopped".to_string(),
        })
        .send()
        .await
        .expect("Failed to update desired state");
    assert!(response.status().is_success());

    let body: ReconcileResponse = config
        .reconcile(&token, &ReconcileRequest::partial(Vec::new()))
        .await
        .expect("Failed to reconcile")
        .json()
        .await
        .expect("Failed to parse response");
    let info = body.find(&workspace.name).expect("Updated workspace is answered");
    assert_eq!(info.desired_state, "Stopped");
    let config_to_apply = info.config_to_apply.as_ref().expect("Config expected");
    assert!(!integration_tests::kinds(config_to_apply).iter().any(|k| k == "Secret"));

    let deployment = config_to_apply
        .iter()
        .find(|r| r["kind"] == "Deployment")
        .expect("Deployment expected");
    assert_eq!(deployment["spec"]["replicas"], 0);
}

#[tokio::test]
async fn test_terminated_workspace_cannot_be_restarted() {
    let Some(config) = TestConfig::connect().await else {
        return;
    };
    let agent = config.register_agent().await.expect("Failed to register agent");
    let workspace = config
        .create_workspace(agent.id)
        .await
        .expect("Failed to create workspace");
    let url = config.api_url(&format!("/workspaces/{}/desired_state", workspace.id));

    for (state, expected) in [
        ("Terminated", reqwest::StatusCode::OK),
        ("Running", reqwest::StatusCode::BAD_REQUEST),
    ] {
        let response = config
            .client
            .put(&url)
            .json(&UpdateDesiredStateRequest {
                desired_state: state.to_string(),
            })
            .send()
            .await
            .expect("Failed to update desired state");
        assert_eq!(response.status(), expected, "moving to {}", state);
    }
}
