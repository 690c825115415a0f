use std::collections::BTreeMap;

use trolley_backend::models::{
    ApiResponse, ClusterRecord, Count, DispatchResponse, GkeBuildRequest, GkeCapabilities,
    Lifetime, ProviderCapabilities, ProviderDetails, ProviderKind, VACANT_USER,
};
use trolley_backend::services::EventType;

#[tokio::test]
async fn test_api_response_serialization() {
    // Тест сериализации ApiResponse
    let response = ApiResponse::success("test data");
    let json = serde_json::to_string(&response).unwrap();

    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"data\":\"test data\""));
    assert!(json.contains("\"error\":null"));
}

#[tokio::test]
async fn test_api_response_error() {
    let response: ApiResponse<()> = ApiResponse::error("boom".to_string());
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_dispatch_response_uses_wire_event_type() {
    let response = DispatchResponse {
        event_type: EventType::GkeDelete,
        cluster_name: Some("c1".to_string()),
        dispatched: true,
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["event_type"], "gke-delete-api-trigger");
}

#[tokio::test]
async fn test_gke_request_accepts_numbers_and_strings() {
    let json = r#"{
        "cluster_name": "g1",
        "user_name": "alice",
        "project_name": "trolley-dev",
        "cluster_version": "1.27",
        "gke_machine_type": "e2-medium",
        "region_name": "us-central1",
        "zone_name": "us-central1-a",
        "image_type": "COS_CONTAINERD",
        "num_nodes": 3,
        "expiration_time": "12"
    }"#;
    let request: GkeBuildRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.num_nodes, Count::Number(3));
    assert_eq!(request.expiration_time.as_i64(), Some(12));
    assert!(request.gcp_project_id.is_none());
}

#[tokio::test]
async fn test_gke_record_document_shape() {
    let mut tags = BTreeMap::new();
    tags.insert("team".to_string(), "infra".to_string());
    let mut record = ClusterRecord::new(
        "g1",
        VACANT_USER,
        ProviderDetails::Gke {
            runtime_version: "1.27.3".to_string(),
            os_image: "COS_CONTAINERD".to_string(),
            tags,
            node_pools: vec![],
        },
        Lifetime::new(1_680_344_430, 1_680_348_030),
    );
    record.zone_name = "us-central1-a".to_string();

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["cluster_type"], "gke");
    assert_eq!(json["human_created_timestamp"], "01-04-2023 10:20:30");
    assert_eq!(json["human_expiration_timestamp"], "01-04-2023 11:20:30");
    assert_eq!(json["tags"]["team"], "infra");
    assert_eq!(json["availability"], true);

    let back: ClusterRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back.provider(), ProviderKind::Gke);
    assert_eq!(back.location(), "us-central1-a");
}

#[tokio::test]
async fn test_capabilities_are_tagged_by_provider() {
    let mut caps = GkeCapabilities::default();
    caps.zones_list = vec!["us-central1-a".to_string()];

    let json = serde_json::to_value(ProviderCapabilities::Gke(caps)).unwrap();
    assert_eq!(json["provider"], "gke");
    assert_eq!(json["zones_list"][0], "us-central1-a");
}

#[tokio::test]
async fn test_provider_kind_parsing() {
    assert_eq!("GKE".parse::<ProviderKind>(), Ok(ProviderKind::Gke));
    assert_eq!("gke-autopilot".parse::<ProviderKind>(), Ok(ProviderKind::GkeAutopilot));
    assert!("openshift".parse::<ProviderKind>().is_err());
}
